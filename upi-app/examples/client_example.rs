//! Client example demonstrating full UPI flows against a running server.
//!
//! Run with: cargo run -p upi-app --example client_example --no-default-features --features sqlite

use std::net::SocketAddr;

use tempfile::tempdir;
use tokio::net::TcpListener;
use upi_client::UpiClient;
use upi_hex::{LedgerService, inbound::HttpServer};
use upi_repo::build_repo;
use upi_types::{AccountType, HistoryQuery, TransferToAccountRequest};

/// Hex-encoded AES-256 key; a real deployment reads ENCRYPTION_KEY instead.
const ENCRYPTION_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

const PIN: &str = "4321";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt().with_env_filter("info").init();

    // Find an available port
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;
    let port = addr.port();
    drop(listener);

    // Use a temp file-backed SQLite DB
    let tmp = tempdir()?;
    let db_path = tmp.path().join("upi.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    println!("🚀 Starting server on port {port}...");
    println!("   Database: {db_url}");

    // Build repository (handles cipher, connection and migration)
    let repo = build_repo(&db_url, ENCRYPTION_KEY).await?;

    // Start server in background
    let service = LedgerService::new(repo);
    let server = HttpServer::new(service);
    let router = server.router();

    let server_addr = format!("127.0.0.1:{port}");
    tokio::spawn(async move {
        axum::serve(
            TcpListener::bind(&server_addr).await.unwrap(),
            router.into_make_service(),
        )
        .await
        .unwrap();
    });

    // Wait for server to start
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    // Create client
    let base_url = format!("http://127.0.0.1:{port}");
    let client = UpiClient::new(&base_url);

    // ─────────────────────────────────────────────────────────────────────────
    // Demo: Full UPI flow
    // ─────────────────────────────────────────────────────────────────────────

    // Health check
    let health = client.health().await?;
    println!("✅ Server health: {health}");

    // Assert response is error unauthorized
    let response = client.list_accounts().await;
    assert!(response.is_err());
    println!("✅ Unauthorized without token: {}", response.unwrap_err());

    // Register Ravi; his access token is shown exactly once
    let reg = client
        .register("Ravi Kumar", "9876543210", "987654321099", "ABCDE3210F")
        .await?;
    println!("✅ Registered: {} (id={})", reg.name, reg.user_id);
    let ravi = client.with_access_token(reg.access_token);

    // Register Priya with her own client
    let reg = UpiClient::new(&base_url)
        .register("Priya Sharma", "9123456789", "912345678999", "ABCDE6789F")
        .await?;
    println!("✅ Registered: {} (id={})", reg.name, reg.user_id);
    let priya = UpiClient::new(&base_url).with_access_token(reg.access_token);

    // Pick a bank and link accounts
    let banks = ravi.list_banks().await?;
    let bank = &banks[0];
    println!("✅ Linking against: {} ({})", bank.name, bank.code);

    let ravi_account = ravi
        .link_account(bank.id, "555500001111", AccountType::Saving, PIN)
        .await?;
    println!(
        "✅ Ravi linked {} -> {}",
        ravi_account.masked_account_number, ravi_account.upi_address
    );

    let priya_account = priya
        .link_account(bank.id, "777700002222", AccountType::Saving, PIN)
        .await?;
    println!(
        "✅ Priya linked {} -> {}",
        priya_account.masked_account_number, priya_account.upi_address
    );

    // Fresh accounts hold nothing, so Ravi activates a credit line to spend from
    let line = ravi.activate_bank_line(ravi_account.id).await?;
    let line = ravi.set_credit_line_pin(line.id, PIN).await?;
    println!(
        "✅ Ravi activated a credit line: limit ₹{:.2}, address {}",
        line.credit_limit as f64 / 100.0,
        line.upi_address
    );

    // Send ₹5000 from the credit line to Priya's UPI address
    let transfer = ravi
        .transfer_to_account(&TransferToAccountRequest {
            amount: 500_000,
            from_account_id: None,
            credit_upi: Some(line.upi_address.clone()),
            to_account_id: None,
            upi_address: Some(priya_account.upi_address.clone()),
            phone: None,
            pin: PIN.to_string(),
            description: Some("Dinner split".to_string()),
        })
        .await?;
    println!(
        "✅ Sent ₹{:.2} to {} (ref={})",
        transfer.amount as f64 / 100.0,
        transfer.receiver.name.as_deref().unwrap_or("receiver"),
        transfer.txn_ref
    );

    // Priya checks her balance with her own PIN
    let balance = priya.balance(priya_account.id.into_uuid(), PIN).await?;
    println!("   Priya balance: ₹{:.2}", balance.available as f64 / 100.0);

    // Ravi checks what is left on the line
    let lines = ravi.list_credit_lines().await?;
    println!(
        "   Ravi credit left: ₹{:.2} of ₹{:.2}",
        lines[0].available_credit as f64 / 100.0,
        lines[0].credit_limit as f64 / 100.0
    );

    // Both sides see the same record, shaped for their role
    let detail = ravi.transaction_detail(transfer.txn_ref.as_str()).await?;
    println!(
        "✅ Ravi sees {} as {:?} ({})",
        detail.txn_ref,
        detail.role,
        detail.status.as_str()
    );

    let detail = priya.transaction_detail(transfer.txn_ref.as_str()).await?;
    println!("✅ Priya sees the same record as {:?}", detail.role);

    // History and recent receivers
    let page = ravi.history(&HistoryQuery::default()).await?;
    println!("\n📋 Ravi's history ({} entries):", page.total);
    for entry in &page.items {
        println!(
            "   - {} {} ₹{:.2} [{}]",
            entry.txn_ref,
            entry.direction.as_str(),
            entry.amount as f64 / 100.0,
            entry.status.as_str()
        );
    }

    let receivers = ravi.recent_receivers().await?;
    println!("\n📋 Ravi recently paid:");
    for r in receivers {
        println!(
            "   - {} ({})",
            r.name.as_deref().unwrap_or("?"),
            r.upi_address.as_deref().unwrap_or("-")
        );
    }

    println!("\n🎉 Example completed successfully!");

    Ok(())
}

//! UPI CLI
//!
//! Command-line interface for the UPI ledger API.

use anyhow::Result;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use upi_client::UpiClient;
use upi_types::{
    AccountId, AccountType, AmountRange, BankId, CreditLineId, DateRange, Direction, HistoryQuery,
    PayToCreditLineRequest, TransactionStatus, TransferKind, TransferToAccountRequest, UpiAddress,
};

#[derive(Parser)]
#[command(name = "upi")]
#[command(author, version, about = "UPI ledger API CLI client", long_about = None)]
struct Cli {
    /// Base URL of the UPI ledger API
    #[arg(long, env = "UPI_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Access token for authentication (issued at registration)
    #[arg(long, env = "UPI_ACCESS_TOKEN")]
    access_token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a user and print the access token (shown exactly once)
    Register {
        /// Full name
        name: String,
        /// Phone number, 10 to 15 digits
        #[arg(long)]
        phone: String,
        /// 12-digit national id
        #[arg(long)]
        aadhaar: String,
        /// PAN, shape AAAAA9999A
        #[arg(long)]
        pan: String,
    },
    /// Bank directory operations
    Bank {
        #[command(subcommand)]
        action: BankCommands,
    },
    /// Account operations
    Account {
        #[command(subcommand)]
        action: AccountCommands,
    },
    /// Credit line operations
    Line {
        #[command(subcommand)]
        action: LineCommands,
    },
    /// PIN-gated balance read for an account or credit line
    Balance {
        /// Funding source ID (UUID)
        #[arg(long)]
        source: String,
        #[arg(long)]
        pin: String,
    },
    /// Move money
    Transfer {
        #[command(subcommand)]
        action: TransferCommands,
    },
    /// Transaction history operations
    Transaction {
        #[command(subcommand)]
        action: TransactionCommands,
    },
    /// Notification gateway tooling
    Notify {
        #[command(subcommand)]
        action: NotifyCommands,
    },
    /// Check API health
    Health,
}

#[derive(Subcommand)]
enum BankCommands {
    /// List banks available for account linking
    List,
    /// Look up a branch by IFSC code
    Ifsc {
        /// IFSC code, case-insensitive
        code: String,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Link a bank account
    Link {
        /// Bank ID (UUID, from `upi bank list`)
        #[arg(long)]
        bank: String,
        /// Account number, 9 to 18 digits
        #[arg(long)]
        number: String,
        /// Account type (saving, current, salary, fixed_deposit)
        #[arg(long, default_value = "saving")]
        account_type: String,
        /// 4 to 6 digit PIN
        #[arg(long)]
        pin: String,
    },
    /// Get account details
    Get {
        /// Account ID (UUID)
        id: String,
    },
    /// List linked accounts
    List,
}

#[derive(Subcommand)]
enum LineCommands {
    /// Activate a credit line anchored to one of your accounts
    ActivateBank {
        /// Anchor account ID (UUID)
        #[arg(long)]
        account: String,
    },
    /// Activate the network-issued credit line
    ActivateNetwork,
    /// List credit lines
    List,
    /// Set the line PIN, activating it for sending
    SetPin {
        /// Credit line ID (UUID)
        #[arg(long)]
        id: String,
        /// 4 to 6 digit PIN
        #[arg(long)]
        pin: String,
    },
}

#[derive(Subcommand)]
enum TransferCommands {
    /// Send to a bank account addressed by id, UPI address or phone
    ToAccount {
        /// Amount in paise
        #[arg(long)]
        amount: i64,
        /// Debit this account (UUID)
        #[arg(long)]
        from_account: Option<String>,
        /// Debit this credit line, addressed by its UPI address
        #[arg(long)]
        credit_upi: Option<String>,
        /// Receiver account ID (UUID)
        #[arg(long)]
        to_account: Option<String>,
        /// Receiver UPI address
        #[arg(long)]
        upi: Option<String>,
        /// Receiver phone number (resolves to their primary account)
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        pin: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Pay down a bank-anchored credit line
    ToLine {
        /// Amount in paise
        #[arg(long)]
        amount: i64,
        /// Debit this account (UUID)
        #[arg(long)]
        from_account: Option<String>,
        /// Debit this credit line, addressed by its UPI address
        #[arg(long)]
        credit_upi: Option<String>,
        /// Receiving credit line ID (UUID)
        #[arg(long)]
        line: String,
        #[arg(long)]
        pin: String,
        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
enum TransactionCommands {
    /// Page through your history, newest first
    History {
        /// Filter by status (pending, completed, failed)
        #[arg(long)]
        status: Option<String>,
        /// Filter by kind (bank, credit_upi)
        #[arg(long)]
        kind: Option<String>,
        /// Relative window (24h, 7d, 14d, 1m, 3m)
        #[arg(long)]
        date_range: Option<String>,
        /// Rupee bucket (upto_1000, 1000_10000, 10000_15000, 15000_25000,
        /// 25000_50000, 50000_75000, 75000_100000)
        #[arg(long)]
        amount_range: Option<String>,
        /// Your side of the transfer (send_money, receive_money, self_transfer)
        #[arg(long)]
        direction: Option<String>,
        /// 1-based page number
        #[arg(long)]
        page: Option<u32>,
    },
    /// Full detail of one transfer
    Detail {
        /// Transaction reference (TXN followed by 18 digits)
        txn_ref: String,
    },
    /// Distinct counterparties you paid recently
    RecentReceivers,
}

#[derive(Subcommand)]
enum NotifyCommands {
    /// Start a local listener that prints gateway deliveries
    Listen {
        /// Port to listen on
        #[arg(long, default_value = "3000")]
        port: u16,
    },
}

fn parse_account_id(s: &str) -> Result<AccountId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid account ID: {}", s))
}

fn parse_line_id(s: &str) -> Result<CreditLineId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid credit line ID: {}", s))
}

fn parse_bank_id(s: &str) -> Result<BankId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid bank ID: {}", s))
}

fn parse_source_id(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|_| anyhow::anyhow!("Invalid funding source ID: {}", s))
}

fn parse_upi(s: &str) -> Result<UpiAddress> {
    UpiAddress::parse(s).map_err(|_| anyhow::anyhow!("Invalid UPI address: {}", s))
}

fn parse_account_type(s: &str) -> Result<AccountType> {
    AccountType::parse(&s.to_lowercase()).map_err(|_| {
        anyhow::anyhow!(
            "Unknown account type: {}. Supported: saving, current, salary, fixed_deposit",
            s
        )
    })
}

fn parse_status(s: &str) -> Result<TransactionStatus> {
    TransactionStatus::parse(&s.to_lowercase()).map_err(|_| {
        anyhow::anyhow!("Unknown status: {}. Supported: pending, completed, failed", s)
    })
}

fn parse_kind(s: &str) -> Result<TransferKind> {
    TransferKind::parse(&s.to_lowercase())
        .map_err(|_| anyhow::anyhow!("Unknown kind: {}. Supported: bank, credit_upi", s))
}

fn parse_date_range(s: &str) -> Result<DateRange> {
    match s {
        "24h" => Ok(DateRange::Last24Hours),
        "7d" => Ok(DateRange::Last7Days),
        "14d" => Ok(DateRange::Last14Days),
        "1m" => Ok(DateRange::LastMonth),
        "3m" => Ok(DateRange::Last3Months),
        _ => anyhow::bail!("Unknown date range: {}. Supported: 24h, 7d, 14d, 1m, 3m", s),
    }
}

fn parse_amount_range(s: &str) -> Result<AmountRange> {
    match s {
        "upto_1000" => Ok(AmountRange::Upto1000),
        "1000_10000" => Ok(AmountRange::From1000To10000),
        "10000_15000" => Ok(AmountRange::From10000To15000),
        "15000_25000" => Ok(AmountRange::From15000To25000),
        "25000_50000" => Ok(AmountRange::From25000To50000),
        "50000_75000" => Ok(AmountRange::From50000To75000),
        "75000_100000" => Ok(AmountRange::From75000To100000),
        _ => anyhow::bail!("Unknown amount range: {}", s),
    }
}

fn parse_direction(s: &str) -> Result<Direction> {
    match s {
        "send_money" => Ok(Direction::SendMoney),
        "receive_money" => Ok(Direction::ReceiveMoney),
        "self_transfer" => Ok(Direction::SelfTransfer),
        _ => anyhow::bail!(
            "Unknown direction: {}. Supported: send_money, receive_money, self_transfer",
            s
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut client = UpiClient::new(&cli.api_url);
    if let Some(token) = cli.access_token {
        client = client.with_access_token(token);
    }

    match cli.command {
        Commands::Health => {
            let healthy = client.health().await?;
            if healthy {
                println!("✓ API is healthy");
            } else {
                println!("✗ API is not healthy");
                std::process::exit(1);
            }
        }

        Commands::Register {
            name,
            phone,
            aadhaar,
            pan,
        } => {
            let reg = client.register(&name, &phone, &aadhaar, &pan).await?;
            println!("{}", serde_json::to_string_pretty(&reg)?);
            eprintln!("Store the access token now; it is never shown again.");
        }

        Commands::Bank { action } => match action {
            BankCommands::List => {
                let banks = client.list_banks().await?;
                println!("{}", serde_json::to_string_pretty(&banks)?);
            }
            BankCommands::Ifsc { code } => {
                let branch = client.find_ifsc(&code).await?;
                println!("{}", serde_json::to_string_pretty(&branch)?);
            }
        },

        Commands::Account { action } => match action {
            AccountCommands::Link {
                bank,
                number,
                account_type,
                pin,
            } => {
                let bank_id = parse_bank_id(&bank)?;
                let account_type = parse_account_type(&account_type)?;
                let account = client
                    .link_account(bank_id, &number, account_type, &pin)
                    .await?;
                println!("{}", serde_json::to_string_pretty(&account)?);
            }
            AccountCommands::Get { id } => {
                let account_id = parse_account_id(&id)?;
                let account = client.get_account(account_id).await?;
                println!("{}", serde_json::to_string_pretty(&account)?);
            }
            AccountCommands::List => {
                let accounts = client.list_accounts().await?;
                println!("{}", serde_json::to_string_pretty(&accounts)?);
            }
        },

        Commands::Line { action } => match action {
            LineCommands::ActivateBank { account } => {
                let account_id = parse_account_id(&account)?;
                let line = client.activate_bank_line(account_id).await?;
                println!("{}", serde_json::to_string_pretty(&line)?);
            }
            LineCommands::ActivateNetwork => {
                let line = client.activate_network_line().await?;
                println!("{}", serde_json::to_string_pretty(&line)?);
            }
            LineCommands::List => {
                let lines = client.list_credit_lines().await?;
                println!("{}", serde_json::to_string_pretty(&lines)?);
            }
            LineCommands::SetPin { id, pin } => {
                let line_id = parse_line_id(&id)?;
                let line = client.set_credit_line_pin(line_id, &pin).await?;
                println!("{}", serde_json::to_string_pretty(&line)?);
            }
        },

        Commands::Balance { source, pin } => {
            let source_id = parse_source_id(&source)?;
            let balance = client.balance(source_id, &pin).await?;
            println!("{}", serde_json::to_string_pretty(&balance)?);
        }

        Commands::Transfer { action } => match action {
            TransferCommands::ToAccount {
                amount,
                from_account,
                credit_upi,
                to_account,
                upi,
                phone,
                pin,
                description,
            } => {
                let req = TransferToAccountRequest {
                    amount,
                    from_account_id: from_account.as_deref().map(parse_account_id).transpose()?,
                    credit_upi: credit_upi.as_deref().map(parse_upi).transpose()?,
                    to_account_id: to_account.as_deref().map(parse_account_id).transpose()?,
                    upi_address: upi.as_deref().map(parse_upi).transpose()?,
                    phone,
                    pin,
                    description,
                };
                let receipt = client.transfer_to_account(&req).await?;
                println!("{}", serde_json::to_string_pretty(&receipt)?);
            }
            TransferCommands::ToLine {
                amount,
                from_account,
                credit_upi,
                line,
                pin,
                description,
            } => {
                let req = PayToCreditLineRequest {
                    amount,
                    from_account_id: from_account.as_deref().map(parse_account_id).transpose()?,
                    credit_upi: credit_upi.as_deref().map(parse_upi).transpose()?,
                    to_credit_line_id: parse_line_id(&line)?,
                    pin,
                    description,
                };
                let receipt = client.pay_to_credit_line(&req).await?;
                println!("{}", serde_json::to_string_pretty(&receipt)?);
            }
        },

        Commands::Transaction { action } => match action {
            TransactionCommands::History {
                status,
                kind,
                date_range,
                amount_range,
                direction,
                page,
            } => {
                let query = HistoryQuery {
                    status: status.as_deref().map(parse_status).transpose()?,
                    kind: kind.as_deref().map(parse_kind).transpose()?,
                    date_range: date_range.as_deref().map(parse_date_range).transpose()?,
                    amount_range: amount_range
                        .as_deref()
                        .map(parse_amount_range)
                        .transpose()?,
                    direction: direction.as_deref().map(parse_direction).transpose()?,
                    page,
                };
                let history = client.history(&query).await?;
                println!("{}", serde_json::to_string_pretty(&history)?);
            }
            TransactionCommands::Detail { txn_ref } => {
                let detail = client.transaction_detail(&txn_ref).await?;
                println!("{}", serde_json::to_string_pretty(&detail)?);
            }
            TransactionCommands::RecentReceivers => {
                let receivers = client.recent_receivers().await?;
                println!("{}", serde_json::to_string_pretty(&receivers)?);
            }
        },

        Commands::Notify { action } => match action {
            NotifyCommands::Listen { port } => {
                let app =
                    axum::Router::new().route("/notify", axum::routing::post(handle_notification));
                let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
                println!("Listening for notifications on {}", addr);
                let listener = tokio::net::TcpListener::bind(&addr).await?;
                axum::serve(listener, app).await?;
            }
        },
    }

    Ok(())
}

async fn handle_notification(
    headers: axum::http::HeaderMap,
    body: String,
) -> impl axum::response::IntoResponse {
    println!("POST /notify HTTP/1.1");
    for (name, value) in &headers {
        println!("{}: {:?}", name, value);
    }
    println!();
    println!("{}", body);
    println!("----------------------------------------");
    axum::http::StatusCode::OK
}

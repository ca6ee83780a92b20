//! UPI Ledger Application Service
//!
//! Orchestrates domain operations through the repository port.
//! Contains NO infrastructure logic - pure business orchestration.
//!
//! The transfer operations follow a fixed shape: shape validation first
//! (malformed requests are rejected before anything is recorded), then
//! resolution, authorization and the atomic ledger move, and finally one
//! immutable record per attempt that made it past validation.

use chrono::Utc;
use serde_json::json;

use upi_repo::security;
use upi_types::domain::account::validate_account_number;
use upi_types::{
    AccountId, AccountResponse, ActivateBankLineRequest, AppError, ApplyTransfer, AuthToken,
    BalanceRequest, BalanceResponse, BankAccount, BankResponse, CallerIdentity, CreditLine,
    CreditLineId, CreditLineKind, CreditLineResponse, HistoryPage, HistoryQuery, IfscDetail,
    IfscResponse, LedgerLeg, LedgerRepository, LinkAccountRequest, Money, NewBankAccount,
    NewCreditLine, Notification, PartyDetail, PartyRef, PayToCreditLineRequest, ReceiverRef,
    ReceiverSummary, RecentReceiver, RegisterRequest, RegisterResponse, RepoError, SenderRef,
    SetPinRequest, TransactionDetailResponse, TransactionRole, TransferKind, TransferRecord,
    TransferResponse, TransferToAccountRequest, TxnRef, User, UserId,
};

/// How often a record write retries with a fresh reference after a
/// txn_ref collision.
const TXN_REF_ATTEMPTS: usize = 3;

/// How many distinct counterparties the recent-receivers listing returns.
const RECENT_RECEIVERS_LIMIT: u32 = 20;

/// Longest free-text description a transfer may carry.
const MAX_DESCRIPTION_CHARS: usize = 255;

/// Application service for the UPI ledger.
///
/// Generic over `R: LedgerRepository` - the storage adapter is injected at
/// compile time, so the same orchestration runs against Postgres, SQLite
/// or an in-memory test double.
pub struct LedgerService<R: LedgerRepository> {
    repo: R,
}

impl<R: LedgerRepository> LedgerService<R> {
    /// Creates a new ledger service with the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Registration & identity
    // ─────────────────────────────────────────────────────────────────────────────

    /// Registers a user and issues their bearer token.
    ///
    /// The raw token appears in the response exactly once; only its digest
    /// is stored.
    pub async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, AppError> {
        let user = User::new(req.name, req.phone, req.aadhaar, req.pan)?;
        self.repo.create_user(&user).await?;

        let raw_token = security::generate_token();
        let token = AuthToken::new(user.id, security::hash_token(&raw_token), "primary".into());
        self.repo.store_token(&token).await?;

        Ok(RegisterResponse {
            user_id: user.id,
            name: user.name,
            phone: user.phone,
            access_token: raw_token,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Bank / IFSC directory
    // ─────────────────────────────────────────────────────────────────────────────

    /// Lists the banks available for account linking.
    pub async fn list_banks(&self) -> Result<Vec<BankResponse>, AppError> {
        let banks = self.repo.list_banks().await?;
        Ok(banks
            .into_iter()
            .map(|b| BankResponse {
                id: b.id,
                name: b.name,
                code: b.code,
            })
            .collect())
    }

    /// Looks up a branch record by IFSC code.
    pub async fn find_ifsc(&self, code: &str) -> Result<IfscResponse, AppError> {
        let code = code.trim().to_ascii_uppercase();
        let detail = self
            .repo
            .find_ifsc(&code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("IFSC {code} not found")))?;
        let bank_name = self
            .repo
            .get_bank(detail.bank_id)
            .await?
            .map(|b| b.name)
            .unwrap_or_default();
        Ok(ifsc_response(detail, bank_name))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Bank accounts
    // ─────────────────────────────────────────────────────────────────────────────

    /// Links a bank account to the caller.
    ///
    /// A random branch of the chosen bank is assigned, the PIN digest is
    /// stored, and a fresh UPI address is claimed. The first linked account
    /// becomes the primary receiving account.
    pub async fn link_account(
        &self,
        caller: &CallerIdentity,
        req: LinkAccountRequest,
    ) -> Result<AccountResponse, AppError> {
        validate_pin_pair(&req.pin, &req.pin_confirmation)?;
        validate_account_number(&req.account_number)?;

        let bank = self
            .repo
            .get_bank(req.bank_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Bank not found".into()))?;
        let ifsc = self
            .repo
            .random_ifsc_for_bank(bank.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Bank has no branches on record".into()))?;
        let user = self.caller_user(caller).await?;

        let account = self
            .repo
            .create_account(NewBankAccount {
                user_id: caller.user_id,
                bank_id: bank.id,
                ifsc_id: ifsc.id,
                holder_name: user.name,
                account_number: req.account_number,
                account_type: req.account_type,
                pin_digest: security::hash_pin(&req.pin),
                pin_length: req.pin.len() as u8,
            })
            .await?;

        Ok(account_response(account, bank.name.clone(), Some(ifsc)))
    }

    /// Lists the caller's linked accounts.
    pub async fn list_accounts(
        &self,
        caller: &CallerIdentity,
    ) -> Result<Vec<AccountResponse>, AppError> {
        let accounts = self.repo.list_accounts_for_user(caller.user_id).await?;
        let mut out = Vec::with_capacity(accounts.len());
        for account in accounts {
            out.push(self.assemble_account(account).await?);
        }
        Ok(out)
    }

    /// Gets one of the caller's accounts. Rows owned by other users are
    /// indistinguishable from missing ones.
    pub async fn get_account(
        &self,
        caller: &CallerIdentity,
        id: AccountId,
    ) -> Result<AccountResponse, AppError> {
        let account = self
            .repo
            .get_account(id)
            .await?
            .filter(|a| a.user_id == caller.user_id)
            .ok_or_else(|| AppError::NotFound("Account not found".into()))?;
        self.assemble_account(account).await
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Credit lines
    // ─────────────────────────────────────────────────────────────────────────────

    /// Activates a credit line anchored to one of the caller's accounts.
    ///
    /// The limit is drawn from a fixed pool at activation. The line starts
    /// without a PIN and cannot send until one is set.
    pub async fn activate_bank_line(
        &self,
        caller: &CallerIdentity,
        req: ActivateBankLineRequest,
    ) -> Result<CreditLineResponse, AppError> {
        let account = self
            .repo
            .get_account(req.account_id)
            .await?
            .filter(|a| a.user_id == caller.user_id)
            .ok_or_else(|| AppError::NotFound("Account not found".into()))?;
        let user = self.caller_user(caller).await?;

        let line = self
            .repo
            .create_credit_line(NewCreditLine {
                user_id: caller.user_id,
                kind: CreditLineKind::Bank,
                anchor_account_id: Some(account.id),
                holder_name: user.name,
                credit_limit: CreditLine::draw_limit(),
            })
            .await?;
        self.assemble_credit_line(line).await
    }

    /// Activates the caller's network-issued credit line. At most one per
    /// user.
    pub async fn activate_network_line(
        &self,
        caller: &CallerIdentity,
    ) -> Result<CreditLineResponse, AppError> {
        let user = self.caller_user(caller).await?;

        let line = self
            .repo
            .create_credit_line(NewCreditLine {
                user_id: caller.user_id,
                kind: CreditLineKind::Network,
                anchor_account_id: None,
                holder_name: user.name,
                credit_limit: CreditLine::draw_limit(),
            })
            .await?;
        self.assemble_credit_line(line).await
    }

    /// Lists the caller's credit lines.
    pub async fn list_credit_lines(
        &self,
        caller: &CallerIdentity,
    ) -> Result<Vec<CreditLineResponse>, AppError> {
        let lines = self.repo.list_credit_lines_for_user(caller.user_id).await?;
        let mut out = Vec::with_capacity(lines.len());
        for line in lines {
            out.push(self.assemble_credit_line(line).await?);
        }
        Ok(out)
    }

    /// Sets or replaces a credit line's PIN, activating the line.
    pub async fn set_credit_line_pin(
        &self,
        caller: &CallerIdentity,
        id: CreditLineId,
        req: SetPinRequest,
    ) -> Result<CreditLineResponse, AppError> {
        validate_pin_pair(&req.pin, &req.pin_confirmation)?;

        self.repo
            .get_credit_line(id)
            .await?
            .filter(|l| l.user_id == caller.user_id)
            .ok_or_else(|| AppError::NotFound("Credit line not found".into()))?;

        self.repo
            .set_credit_line_pin(id, &security::hash_pin(&req.pin), req.pin.len() as u8)
            .await?;

        let line = self
            .repo
            .get_credit_line(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Credit line not found".into()))?;
        self.assemble_credit_line(line).await
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Balance
    // ─────────────────────────────────────────────────────────────────────────────

    /// PIN-gated read of available balance (accounts) or available credit
    /// (credit lines). Reading moves no value and may be repeated freely.
    pub async fn balance(
        &self,
        caller: &CallerIdentity,
        req: BalanceRequest,
    ) -> Result<BalanceResponse, AppError> {
        validate_pin_shape(&req.pin)?;

        if let Some(account) = self.repo.get_account(AccountId::from_uuid(req.source_id)).await? {
            if account.user_id == caller.user_id {
                if !security::verify_pin(&req.pin, &account.pin_digest) {
                    return Err(AppError::InvalidCredential);
                }
                return Ok(BalanceResponse {
                    source_id: req.source_id,
                    available: account.balance.paise(),
                });
            }
        }

        if let Some(line) = self
            .repo
            .get_credit_line(CreditLineId::from_uuid(req.source_id))
            .await?
        {
            if line.user_id == caller.user_id {
                let digest = line.pin_digest.as_deref().ok_or(AppError::InvalidCredential)?;
                if !security::verify_pin(&req.pin, digest) {
                    return Err(AppError::InvalidCredential);
                }
                return Ok(BalanceResponse {
                    source_id: req.source_id,
                    available: line.available_credit.paise(),
                });
            }
        }

        Err(AppError::NotFound("Funding source not found".into()))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Transfers
    // ─────────────────────────────────────────────────────────────────────────────

    /// Moves money from one of the caller's funding sources to a bank
    /// account addressed by id, UPI address or phone number.
    ///
    /// Every attempt that passes shape validation leaves exactly one record
    /// with a terminal status; the failure record keeps the most specific
    /// references resolution reached. The receiving user is notified after
    /// commit, best-effort.
    pub async fn transfer_to_account(
        &self,
        caller: &CallerIdentity,
        req: TransferToAccountRequest,
    ) -> Result<TransferResponse, AppError> {
        let amount = parse_amount(req.amount)?;
        let sender = req.sender_ref()?;
        let receiver = req.receiver_ref()?;
        validate_pin_shape(&req.pin)?;
        validate_description(req.description.as_deref())?;

        let txn_ref = TxnRef::generate(Utc::now());
        let kind = transfer_kind(&sender);
        let mut attempt = AttemptContext {
            sender: sender_party(&sender),
            receiver: receiver.as_party_ref(),
            to_user_id: None,
        };

        match self
            .run_account_transfer(caller, &sender, &receiver, &req.pin, amount, &mut attempt)
            .await
        {
            Ok(receiving) => {
                let record = TransferRecord::completed(
                    txn_ref,
                    kind,
                    amount,
                    attempt.sender,
                    attempt.receiver,
                    req.description,
                    Some(caller.user_id),
                    attempt.to_user_id,
                )?;
                let timestamp = record.created_at;
                let txn_ref = self.persist_record(record).await;

                self.notify_receiver(caller, &receiving, amount, &txn_ref).await;
                let summary = self.receiver_summary(&receiving).await;

                Ok(TransferResponse {
                    txn_ref,
                    kind,
                    amount: amount.paise(),
                    timestamp,
                    receiver: summary,
                })
            }
            Err(err) => {
                self.record_failure(&txn_ref, kind, amount, attempt, req.description, caller)
                    .await;
                Err(err)
            }
        }
    }

    /// Pays down a bank-anchored credit line, restoring its available
    /// credit. The recorded receiver is the bank behind the line.
    pub async fn pay_to_credit_line(
        &self,
        caller: &CallerIdentity,
        req: PayToCreditLineRequest,
    ) -> Result<TransferResponse, AppError> {
        let amount = parse_amount(req.amount)?;
        let sender = req.sender_ref()?;
        validate_pin_shape(&req.pin)?;
        validate_description(req.description.as_deref())?;

        // The receiving line resolves before any audit context exists; an
        // unknown or network line aborts without a record.
        let receiving = self
            .repo
            .get_credit_line(req.to_credit_line_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Credit line not found".into()))?;
        let anchor_id = match (receiving.kind, receiving.anchor_account_id) {
            (CreditLineKind::Bank, Some(id)) => id,
            _ => return Err(AppError::NotFound("Credit line not found".into())),
        };
        let anchor = self
            .repo
            .get_account(anchor_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Credit line not found".into()))?;

        let txn_ref = TxnRef::generate(Utc::now());
        let kind = transfer_kind(&sender);
        let attempt = AttemptContext {
            sender: sender_party(&sender),
            receiver: PartyRef::bank(anchor.bank_id),
            to_user_id: Some(receiving.user_id),
        };

        match self
            .run_line_payment(caller, &sender, &req.pin, &receiving, amount)
            .await
        {
            Ok(()) => {
                let record = TransferRecord::completed(
                    txn_ref,
                    kind,
                    amount,
                    attempt.sender,
                    attempt.receiver,
                    req.description,
                    Some(caller.user_id),
                    attempt.to_user_id,
                )?;
                let timestamp = record.created_at;
                let txn_ref = self.persist_record(record).await;

                let name = self
                    .repo
                    .get_user(receiving.user_id)
                    .await
                    .ok()
                    .flatten()
                    .map(|u| u.name);
                let bank_name = self
                    .repo
                    .get_bank(anchor.bank_id)
                    .await
                    .ok()
                    .flatten()
                    .map(|b| b.name);

                Ok(TransferResponse {
                    txn_ref,
                    kind,
                    amount: amount.paise(),
                    timestamp,
                    receiver: ReceiverSummary {
                        name,
                        upi_address: Some(receiving.upi_address.clone()),
                        masked_account_number: Some(anchor.masked_number()),
                        bank_name,
                    },
                })
            }
            Err(err) => {
                self.record_failure(&txn_ref, kind, amount, attempt, req.description, caller)
                    .await;
                Err(err)
            }
        }
    }

    /// Resolution, authorization and the atomic move for an account
    /// transfer. Returns the resolved receiving account on commit.
    async fn run_account_transfer(
        &self,
        caller: &CallerIdentity,
        sender: &SenderRef,
        receiver: &ReceiverRef,
        pin: &str,
        amount: Money,
        attempt: &mut AttemptContext,
    ) -> Result<BankAccount, AppError> {
        let receiving = self.resolve_receiver(receiver).await?;
        attempt.receiver = PartyRef::account(receiving.id);
        attempt.to_user_id = Some(receiving.user_id);

        let debit = match sender {
            SenderRef::Account(id) => {
                let account = self
                    .repo
                    .get_account(*id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Sender account not found".into()))?;
                if account.id == receiving.id {
                    return Err(AppError::InvalidReceiver);
                }
                if account.user_id != caller.user_id {
                    return Err(AppError::Unauthorized);
                }
                if !security::verify_pin(pin, &account.pin_digest) {
                    return Err(AppError::InvalidCredential);
                }
                if !account.has_sufficient_funds(&amount) {
                    return Err(AppError::InsufficientFunds {
                        available: account.balance.paise(),
                        requested: amount.paise(),
                    });
                }
                LedgerLeg::Account(account.id)
            }
            SenderRef::CreditUpi(address) => {
                let line = self
                    .repo
                    .find_credit_line_by_upi(address)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Credit UPI not found".into()))?;
                if line.user_id != caller.user_id {
                    return Err(AppError::Unauthorized);
                }
                self.check_line_debit(&line, pin, amount)?;
                LedgerLeg::CreditLine(line.id)
            }
        };

        self.repo
            .apply_transfer(ApplyTransfer {
                debit,
                credit: LedgerLeg::Account(receiving.id),
                amount,
            })
            .await?;

        Ok(receiving)
    }

    /// Resolution, authorization and the atomic move for a credit line
    /// payment.
    async fn run_line_payment(
        &self,
        caller: &CallerIdentity,
        sender: &SenderRef,
        pin: &str,
        receiving: &CreditLine,
        amount: Money,
    ) -> Result<(), AppError> {
        // A repayment can never push available credit past the limit.
        if !receiving.can_accept_repayment(&amount) {
            return Err(AppError::CreditLimitExceeded);
        }

        let debit = match sender {
            SenderRef::Account(id) => {
                let account = self
                    .repo
                    .get_account(*id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Sender account not found".into()))?;
                if account.user_id != caller.user_id {
                    return Err(AppError::Unauthorized);
                }
                if !security::verify_pin(pin, &account.pin_digest) {
                    return Err(AppError::InvalidCredential);
                }
                if !account.has_sufficient_funds(&amount) {
                    return Err(AppError::InsufficientFunds {
                        available: account.balance.paise(),
                        requested: amount.paise(),
                    });
                }
                LedgerLeg::Account(account.id)
            }
            SenderRef::CreditUpi(address) => {
                let line = self
                    .repo
                    .find_credit_line_by_upi(address)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Credit UPI not found".into()))?;
                // A line may only pay a line anchored at the same account.
                if line.anchor_account_id != receiving.anchor_account_id {
                    return Err(AppError::Unauthorized);
                }
                if line.user_id != caller.user_id {
                    return Err(AppError::Unauthorized);
                }
                self.check_line_debit(&line, pin, amount)?;
                LedgerLeg::CreditLine(line.id)
            }
        };

        self.repo
            .apply_transfer(ApplyTransfer {
                debit,
                credit: LedgerLeg::CreditLine(receiving.id),
                amount,
            })
            .await?;

        Ok(())
    }

    /// Authorizes an outbound debit from a credit line. A line with no PIN
    /// set is inactive and can never send.
    fn check_line_debit(&self, line: &CreditLine, pin: &str, amount: Money) -> Result<(), AppError> {
        let digest = line.pin_digest.as_deref().ok_or(AppError::InvalidCredential)?;
        if !security::verify_pin(pin, digest) {
            return Err(AppError::InvalidCredential);
        }
        if !line.has_sufficient_credit(&amount) {
            return Err(AppError::InsufficientFunds {
                available: line.available_credit.paise(),
                requested: amount.paise(),
            });
        }
        Ok(())
    }

    /// Resolves the receiving account. Phone numbers land in the holder's
    /// primary account.
    async fn resolve_receiver(&self, receiver: &ReceiverRef) -> Result<BankAccount, AppError> {
        let account = match receiver {
            ReceiverRef::Phone(number) => {
                let user = self
                    .repo
                    .find_user_by_phone(number)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Receiver not found".into()))?;
                self.repo.primary_account_for_user(user.id).await?
            }
            ReceiverRef::Account(id) => self.repo.get_account(*id).await?,
            ReceiverRef::Upi(address) => self.repo.find_account_by_upi(address).await?,
        };
        account.ok_or_else(|| AppError::NotFound("Receiver not found".into()))
    }

    /// Writes one audit record, regenerating the reference on a collision.
    /// Returns the reference actually stored. Record persistence never
    /// overturns a transfer outcome; storage errors are logged and the
    /// caller keeps the last reference tried.
    async fn persist_record(&self, mut record: TransferRecord) -> TxnRef {
        for attempt in 0..TXN_REF_ATTEMPTS {
            match self.repo.record_transfer(&record).await {
                Ok(()) => return record.txn_ref,
                Err(RepoError::Conflict(_)) if attempt + 1 < TXN_REF_ATTEMPTS => {
                    record.txn_ref = TxnRef::generate(Utc::now());
                }
                Err(err) => {
                    tracing::error!(txn_ref = %record.txn_ref, "failed to persist transfer record: {err}");
                    return record.txn_ref;
                }
            }
        }
        record.txn_ref
    }

    /// Builds and writes the failure record for an aborted attempt.
    async fn record_failure(
        &self,
        txn_ref: &TxnRef,
        kind: TransferKind,
        amount: Money,
        attempt: AttemptContext,
        description: Option<String>,
        caller: &CallerIdentity,
    ) {
        let record = match TransferRecord::failed(
            txn_ref.clone(),
            kind,
            amount,
            attempt.sender,
            attempt.receiver,
            description,
            Some(caller.user_id),
            attempt.to_user_id,
        ) {
            Ok(record) => record,
            Err(err) => {
                tracing::error!(txn_ref = %txn_ref, "failed to build failure record: {err}");
                return;
            }
        };
        self.persist_record(record).await;
    }

    /// Queues a push notification for the receiving user. Delivery is
    /// best-effort and never affects the transfer outcome.
    async fn notify_receiver(
        &self,
        caller: &CallerIdentity,
        receiving: &BankAccount,
        amount: Money,
        txn_ref: &TxnRef,
    ) {
        let sender_name = self
            .repo
            .get_user(caller.user_id)
            .await
            .ok()
            .flatten()
            .map(|u| u.name)
            .unwrap_or_else(|| caller.phone.clone());

        let notification = Notification::new(
            receiving.user_id,
            "Money Received",
            format!("You received {amount} from {sender_name}"),
            json!({
                "screen": "TransactionSuccessScreen",
                "txn_ref": txn_ref.as_str(),
            }),
        );
        if let Err(err) = self.repo.enqueue_notification(&notification).await {
            tracing::warn!(txn_ref = %txn_ref, "failed to queue receiver notification: {err}");
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Transaction records
    // ─────────────────────────────────────────────────────────────────────────────

    /// Pages through the caller's history, newest first, with filters.
    pub async fn history(
        &self,
        caller: &CallerIdentity,
        query: HistoryQuery,
    ) -> Result<HistoryPage, AppError> {
        self.repo
            .history_for_user(caller.user_id, &query)
            .await
            .map_err(Into::into)
    }

    /// Distinct counterparties the caller most recently paid.
    pub async fn recent_receivers(
        &self,
        caller: &CallerIdentity,
    ) -> Result<Vec<RecentReceiver>, AppError> {
        self.repo
            .recent_receivers(caller.user_id, RECENT_RECEIVERS_LIMIT)
            .await
            .map_err(Into::into)
    }

    /// Full detail of one recorded transfer, shaped for the caller.
    /// Only the two parties may read a record; everyone else sees nothing.
    pub async fn transaction_detail(
        &self,
        caller: &CallerIdentity,
        txn_ref: &str,
    ) -> Result<TransactionDetailResponse, AppError> {
        let txn_ref = TxnRef::parse(txn_ref)?;
        let record = self
            .repo
            .find_transaction_by_ref(&txn_ref)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found".into()))?;

        let role = if record.from_user_id == Some(caller.user_id) {
            TransactionRole::Sender
        } else if record.to_user_id == Some(caller.user_id) {
            TransactionRole::Receiver
        } else {
            return Err(AppError::NotFound("Transaction not found".into()));
        };

        let sender = self.party_detail(&record.sender).await?;
        let receiver = self.party_detail(&record.receiver).await?;

        Ok(TransactionDetailResponse {
            txn_ref: record.txn_ref,
            kind: record.kind,
            status: record.status,
            amount: record.amount.paise(),
            description: record.description,
            role,
            sender,
            receiver,
            created_at: record.created_at,
        })
    }

    /// Resolves a recorded party reference into display fields. References
    /// that no longer resolve produce a sparse detail rather than an error.
    async fn party_detail(&self, party: &PartyRef) -> Result<PartyDetail, AppError> {
        let detail = match party {
            PartyRef::Account { id } => match self.repo.get_account(*id).await? {
                Some(account) => self.account_party_detail(account).await?,
                None => PartyDetail::default(),
            },
            PartyRef::Upi { address } => {
                if let Some(account) = self.repo.find_account_by_upi(address).await? {
                    self.account_party_detail(account).await?
                } else if let Some(line) = self.repo.find_credit_line_by_upi(address).await? {
                    PartyDetail {
                        name: self.repo.get_user(line.user_id).await?.map(|u| u.name),
                        upi_address: Some(line.upi_address.to_string()),
                        ..Default::default()
                    }
                } else {
                    PartyDetail {
                        upi_address: Some(address.to_string()),
                        ..Default::default()
                    }
                }
            }
            PartyRef::Bank { id } => PartyDetail {
                bank_name: self.repo.get_bank(*id).await?.map(|b| b.name),
                ..Default::default()
            },
            PartyRef::Phone { number } => PartyDetail {
                name: self.repo.find_user_by_phone(number).await?.map(|u| u.name),
                ..Default::default()
            },
        };
        Ok(detail)
    }

    async fn account_party_detail(&self, account: BankAccount) -> Result<PartyDetail, AppError> {
        Ok(PartyDetail {
            name: self.repo.get_user(account.user_id).await?.map(|u| u.name),
            upi_address: Some(account.upi_address.to_string()),
            masked_account_number: Some(account.masked_number()),
            bank_name: self.repo.get_bank(account.bank_id).await?.map(|b| b.name),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Response assembly
    // ─────────────────────────────────────────────────────────────────────────────

    async fn caller_user(&self, caller: &CallerIdentity) -> Result<User, AppError> {
        self.repo
            .get_user(caller.user_id)
            .await?
            .ok_or_else(|| AppError::Internal("authenticated user row missing".into()))
    }

    async fn assemble_account(&self, account: BankAccount) -> Result<AccountResponse, AppError> {
        let bank_name = self
            .repo
            .get_bank(account.bank_id)
            .await?
            .map(|b| b.name)
            .unwrap_or_default();
        let ifsc = self.repo.get_ifsc(account.ifsc_id).await?;
        Ok(account_response(account, bank_name, ifsc))
    }

    async fn assemble_credit_line(&self, line: CreditLine) -> Result<CreditLineResponse, AppError> {
        let bank_name = match line.anchor_account_id {
            Some(anchor_id) => match self.repo.get_account(anchor_id).await? {
                Some(anchor) => self.repo.get_bank(anchor.bank_id).await?.map(|b| b.name),
                None => None,
            },
            None => None,
        };
        Ok(CreditLineResponse {
            id: line.id,
            kind: line.kind,
            anchor_account_id: line.anchor_account_id,
            bank_name,
            credit_limit: line.credit_limit.paise(),
            available_credit: line.available_credit.paise(),
            is_active: line.is_active(),
            upi_address: line.upi_address,
            created_at: line.created_at,
        })
    }

    /// Receipt detail for the receiving account, assembled after commit.
    /// Lookups here are best-effort; a sparse receipt never fails the
    /// transfer.
    async fn receiver_summary(&self, account: &BankAccount) -> ReceiverSummary {
        let name = self
            .repo
            .get_user(account.user_id)
            .await
            .ok()
            .flatten()
            .map(|u| u.name);
        let bank_name = self
            .repo
            .get_bank(account.bank_id)
            .await
            .ok()
            .flatten()
            .map(|b| b.name);
        ReceiverSummary {
            name,
            upi_address: Some(account.upi_address.clone()),
            masked_account_number: Some(account.masked_number()),
            bank_name,
        }
    }
}

/// Audit context for one transfer attempt. Starts from the references the
/// caller presented and is upgraded as resolution progresses, so a failure
/// record always carries the most specific references known at the time.
struct AttemptContext {
    sender: PartyRef,
    receiver: PartyRef,
    to_user_id: Option<UserId>,
}

fn transfer_kind(sender: &SenderRef) -> TransferKind {
    match sender {
        SenderRef::Account(_) => TransferKind::Bank,
        SenderRef::CreditUpi(_) => TransferKind::CreditUpi,
    }
}

fn sender_party(sender: &SenderRef) -> PartyRef {
    match sender {
        SenderRef::Account(id) => PartyRef::account(*id),
        SenderRef::CreditUpi(address) => PartyRef::upi(address.clone()),
    }
}

fn parse_amount(paise: i64) -> Result<Money, AppError> {
    let amount = Money::new(paise)?;
    if !amount.is_valid_transfer_amount() {
        return Err(AppError::Validation(
            "amount must be positive and within the transfer ceiling".into(),
        ));
    }
    Ok(amount)
}

/// PINs are 4 to 6 ASCII digits.
fn validate_pin_shape(pin: &str) -> Result<(), AppError> {
    if pin.len() < 4 || pin.len() > 6 || !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::Validation("PIN must be 4 to 6 digits".into()));
    }
    Ok(())
}

fn validate_pin_pair(pin: &str, confirmation: &str) -> Result<(), AppError> {
    validate_pin_shape(pin)?;
    if pin != confirmation {
        return Err(AppError::Validation("PIN confirmation does not match".into()));
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<(), AppError> {
    if let Some(text) = description {
        if text.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(AppError::Validation(format!(
                "description must be at most {MAX_DESCRIPTION_CHARS} characters"
            )));
        }
    }
    Ok(())
}

fn account_response(
    account: BankAccount,
    bank_name: String,
    ifsc: Option<IfscDetail>,
) -> AccountResponse {
    AccountResponse {
        id: account.id,
        masked_account_number: account.masked_number(),
        account_type: account.account_type,
        is_primary: account.is_primary,
        upi_address: account.upi_address,
        ifsc: ifsc.map(|detail| ifsc_response(detail, bank_name.clone())),
        bank_name,
        created_at: account.created_at,
    }
}

fn ifsc_response(detail: IfscDetail, bank_name: String) -> IfscResponse {
    IfscResponse {
        ifsc_code: detail.ifsc_code,
        bank_name,
        branch: detail.branch,
        city: detail.city,
        state: detail.state,
    }
}

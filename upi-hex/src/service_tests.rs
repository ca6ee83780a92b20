//! LedgerService unit tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use upi_repo::security;
    use upi_types::{
        AccountId, AccountResponse, AccountType, ActivateBankLineRequest, AppError, ApplyTransfer,
        AuthToken, BalanceRequest, Bank, BankAccount, BankId, CallerIdentity, CreditLine,
        CreditLineId, CreditLineKind, CreditLineResponse, Direction, DomainError, HISTORY_PAGE_SIZE,
        HistoryEntry, HistoryPage, HistoryQuery, IfscDetail, IfscId, LedgerLeg, LedgerRepository,
        LinkAccountRequest, Money, NewBankAccount, NewCreditLine, Notification, NotificationId,
        NotificationStatus, PartyDetail, PartyRef, PayToCreditLineRequest, RecentReceiver,
        RegisterRequest, RepoError, SetPinRequest, TransactionRole, TransactionStatus,
        TransferKind, TransferRecord, TransferToAccountRequest, TxnRef, UpiAddress, User, UserId,
    };

    use crate::LedgerService;

    const PIN: &str = "4321";
    const WRONG_PIN: &str = "9999";

    /// In-memory repository for testing the service layer.
    pub struct MockRepo {
        users: Mutex<HashMap<UserId, User>>,
        tokens: Mutex<Vec<AuthToken>>,
        banks: Vec<Bank>,
        ifsc: Vec<IfscDetail>,
        accounts: Mutex<HashMap<AccountId, BankAccount>>,
        credit_lines: Mutex<HashMap<CreditLineId, CreditLine>>,
        records: Mutex<Vec<TransferRecord>>,
        notifications: Mutex<Vec<Notification>>,
    }

    impl MockRepo {
        pub fn new() -> Self {
            let sbi = Bank {
                id: BankId::new(),
                name: "State Bank of India".into(),
                code: "SBI".into(),
            };
            let hdfc = Bank {
                id: BankId::new(),
                name: "HDFC Bank".into(),
                code: "HDFC".into(),
            };
            let ifsc = vec![
                IfscDetail {
                    id: IfscId::new(),
                    bank_id: sbi.id,
                    ifsc_code: "SBIN0001234".into(),
                    branch: "Fort".into(),
                    city: "Mumbai".into(),
                    state: "Maharashtra".into(),
                },
                IfscDetail {
                    id: IfscId::new(),
                    bank_id: hdfc.id,
                    ifsc_code: "HDFC0005678".into(),
                    branch: "Koramangala".into(),
                    city: "Bengaluru".into(),
                    state: "Karnataka".into(),
                },
            ];
            Self {
                users: Mutex::new(HashMap::new()),
                tokens: Mutex::new(Vec::new()),
                banks: vec![sbi, hdfc],
                ifsc,
                accounts: Mutex::new(HashMap::new()),
                credit_lines: Mutex::new(HashMap::new()),
                records: Mutex::new(Vec::new()),
                notifications: Mutex::new(Vec::new()),
            }
        }

        fn seed_balance(&self, id: AccountId, paise: i64) {
            let mut accounts = self.accounts.lock().unwrap();
            accounts.get_mut(&id).unwrap().balance = Money::new(paise).unwrap();
        }

        fn account_balance(&self, id: AccountId) -> i64 {
            self.accounts.lock().unwrap()[&id].balance.paise()
        }

        fn line_available(&self, id: CreditLineId) -> i64 {
            self.credit_lines.lock().unwrap()[&id].available_credit.paise()
        }

        fn recorded(&self) -> Vec<TransferRecord> {
            self.records.lock().unwrap().clone()
        }

        fn queued(&self) -> Vec<Notification> {
            self.notifications.lock().unwrap().clone()
        }
    }

    fn direction_for(record: &TransferRecord, user_id: UserId) -> Direction {
        match (
            record.from_user_id == Some(user_id),
            record.to_user_id == Some(user_id),
        ) {
            (true, true) => Direction::SelfTransfer,
            (true, false) => Direction::SendMoney,
            _ => Direction::ReceiveMoney,
        }
    }

    #[async_trait]
    impl LedgerRepository for MockRepo {
        async fn create_user(&self, user: &User) -> Result<(), RepoError> {
            let mut users = self.users.lock().unwrap();
            if users.values().any(|u| u.phone == user.phone) {
                return Err(RepoError::Conflict("phone number already registered".into()));
            }
            if users
                .values()
                .any(|u| u.aadhaar == user.aadhaar || u.pan == user.pan)
            {
                return Err(RepoError::Conflict(
                    "identity document already registered".into(),
                ));
            }
            users.insert(user.id, user.clone());
            Ok(())
        }

        async fn get_user(&self, id: UserId) -> Result<Option<User>, RepoError> {
            Ok(self.users.lock().unwrap().get(&id).cloned())
        }

        async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, RepoError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .values()
                .find(|u| u.phone == phone)
                .cloned())
        }

        async fn store_token(&self, token: &AuthToken) -> Result<(), RepoError> {
            self.tokens.lock().unwrap().push(token.clone());
            Ok(())
        }

        async fn identity_by_token_digest(
            &self,
            digest: &str,
        ) -> Result<Option<CallerIdentity>, RepoError> {
            let tokens = self.tokens.lock().unwrap();
            let users = self.users.lock().unwrap();
            Ok(tokens
                .iter()
                .find(|t| t.token_digest == digest)
                .and_then(|t| users.get(&t.user_id))
                .map(|u| CallerIdentity {
                    user_id: u.id,
                    phone: u.phone.clone(),
                }))
        }

        async fn list_banks(&self) -> Result<Vec<Bank>, RepoError> {
            Ok(self.banks.clone())
        }

        async fn get_bank(&self, id: BankId) -> Result<Option<Bank>, RepoError> {
            Ok(self.banks.iter().find(|b| b.id == id).cloned())
        }

        async fn random_ifsc_for_bank(
            &self,
            bank_id: BankId,
        ) -> Result<Option<IfscDetail>, RepoError> {
            Ok(self.ifsc.iter().find(|i| i.bank_id == bank_id).cloned())
        }

        async fn find_ifsc(&self, code: &str) -> Result<Option<IfscDetail>, RepoError> {
            Ok(self.ifsc.iter().find(|i| i.ifsc_code == code).cloned())
        }

        async fn get_ifsc(&self, id: IfscId) -> Result<Option<IfscDetail>, RepoError> {
            Ok(self.ifsc.iter().find(|i| i.id == id).cloned())
        }

        async fn create_account(&self, new: NewBankAccount) -> Result<BankAccount, RepoError> {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts
                .values()
                .any(|a| a.account_number == new.account_number)
            {
                return Err(RepoError::Conflict("account number already linked".into()));
            }
            let is_primary = !accounts.values().any(|a| a.user_id == new.user_id);
            let account = BankAccount::from_parts(
                AccountId::new(),
                new.user_id,
                new.bank_id,
                new.ifsc_id,
                new.account_number,
                new.account_type,
                Money::zero(),
                new.pin_digest,
                new.pin_length,
                is_primary,
                UpiAddress::generate(&new.holder_name),
                Utc::now(),
            );
            accounts.insert(account.id, account.clone());
            Ok(account)
        }

        async fn list_accounts_for_user(
            &self,
            user_id: UserId,
        ) -> Result<Vec<BankAccount>, RepoError> {
            let mut out: Vec<BankAccount> = self
                .accounts
                .lock()
                .unwrap()
                .values()
                .filter(|a| a.user_id == user_id)
                .cloned()
                .collect();
            out.sort_by_key(|a| a.created_at);
            Ok(out)
        }

        async fn get_account(&self, id: AccountId) -> Result<Option<BankAccount>, RepoError> {
            Ok(self.accounts.lock().unwrap().get(&id).cloned())
        }

        async fn find_account_by_upi(
            &self,
            address: &UpiAddress,
        ) -> Result<Option<BankAccount>, RepoError> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .values()
                .find(|a| a.upi_address == *address)
                .cloned())
        }

        async fn primary_account_for_user(
            &self,
            user_id: UserId,
        ) -> Result<Option<BankAccount>, RepoError> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .values()
                .find(|a| a.user_id == user_id && a.is_primary)
                .cloned())
        }

        async fn create_credit_line(&self, new: NewCreditLine) -> Result<CreditLine, RepoError> {
            let mut lines = self.credit_lines.lock().unwrap();
            match new.kind {
                CreditLineKind::Bank => {
                    if lines.values().any(|l| {
                        l.user_id == new.user_id
                            && l.kind == CreditLineKind::Bank
                            && l.anchor_account_id == new.anchor_account_id
                    }) {
                        return Err(RepoError::Conflict(
                            "credit line already activated for this account".into(),
                        ));
                    }
                }
                CreditLineKind::Network => {
                    if lines
                        .values()
                        .any(|l| l.user_id == new.user_id && l.kind == CreditLineKind::Network)
                    {
                        return Err(RepoError::Conflict(
                            "network credit line already exists".into(),
                        ));
                    }
                }
            }
            let line = CreditLine::from_parts(
                CreditLineId::new(),
                new.user_id,
                new.kind,
                new.anchor_account_id,
                new.credit_limit,
                new.credit_limit,
                None,
                None,
                UpiAddress::generate(&new.holder_name),
                Utc::now(),
            );
            lines.insert(line.id, line.clone());
            Ok(line)
        }

        async fn list_credit_lines_for_user(
            &self,
            user_id: UserId,
        ) -> Result<Vec<CreditLine>, RepoError> {
            let mut out: Vec<CreditLine> = self
                .credit_lines
                .lock()
                .unwrap()
                .values()
                .filter(|l| l.user_id == user_id)
                .cloned()
                .collect();
            out.sort_by_key(|l| l.created_at);
            Ok(out)
        }

        async fn get_credit_line(
            &self,
            id: CreditLineId,
        ) -> Result<Option<CreditLine>, RepoError> {
            Ok(self.credit_lines.lock().unwrap().get(&id).cloned())
        }

        async fn find_credit_line_by_upi(
            &self,
            address: &UpiAddress,
        ) -> Result<Option<CreditLine>, RepoError> {
            Ok(self
                .credit_lines
                .lock()
                .unwrap()
                .values()
                .find(|l| l.upi_address == *address)
                .cloned())
        }

        async fn set_credit_line_pin(
            &self,
            id: CreditLineId,
            pin_digest: &str,
            pin_length: u8,
        ) -> Result<(), RepoError> {
            let mut lines = self.credit_lines.lock().unwrap();
            let line = lines.get_mut(&id).ok_or(RepoError::NotFound)?;
            line.pin_digest = Some(pin_digest.to_string());
            line.pin_length = Some(pin_length);
            Ok(())
        }

        async fn apply_transfer(&self, req: ApplyTransfer) -> Result<(), RepoError> {
            let mut accounts = self.accounts.lock().unwrap();
            let mut lines = self.credit_lines.lock().unwrap();

            // Check the credit leg before mutating anything, like the real
            // adapters do under their storage transaction.
            match req.credit {
                LedgerLeg::Account(id) => {
                    accounts.get(&id).ok_or(RepoError::NotFound)?;
                }
                LedgerLeg::CreditLine(id) => {
                    let line = lines.get(&id).ok_or(RepoError::NotFound)?;
                    if !line.can_accept_repayment(&req.amount) {
                        return Err(RepoError::Domain(DomainError::CreditLimitExceeded {
                            limit: line.credit_limit.paise(),
                            would_be: line.available_credit.paise() + req.amount.paise(),
                        }));
                    }
                }
            }

            match req.debit {
                LedgerLeg::Account(id) => accounts
                    .get_mut(&id)
                    .ok_or(RepoError::NotFound)?
                    .debit(req.amount)
                    .map_err(RepoError::Domain)?,
                LedgerLeg::CreditLine(id) => lines
                    .get_mut(&id)
                    .ok_or(RepoError::NotFound)?
                    .spend(req.amount)
                    .map_err(RepoError::Domain)?,
            }
            match req.credit {
                LedgerLeg::Account(id) => accounts
                    .get_mut(&id)
                    .ok_or(RepoError::NotFound)?
                    .credit(req.amount)
                    .map_err(RepoError::Domain)?,
                LedgerLeg::CreditLine(id) => lines
                    .get_mut(&id)
                    .ok_or(RepoError::NotFound)?
                    .repay(req.amount)
                    .map_err(RepoError::Domain)?,
            }
            Ok(())
        }

        async fn record_transfer(&self, record: &TransferRecord) -> Result<(), RepoError> {
            let mut records = self.records.lock().unwrap();
            if records.iter().any(|r| r.txn_ref == record.txn_ref) {
                return Err(RepoError::Conflict("duplicate txn ref".into()));
            }
            records.push(record.clone());
            Ok(())
        }

        async fn find_transaction_by_ref(
            &self,
            txn_ref: &TxnRef,
        ) -> Result<Option<TransferRecord>, RepoError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.txn_ref == *txn_ref)
                .cloned())
        }

        async fn history_for_user(
            &self,
            user_id: UserId,
            query: &HistoryQuery,
        ) -> Result<HistoryPage, RepoError> {
            let records = self.records.lock().unwrap();
            let mut matching: Vec<&TransferRecord> = records
                .iter()
                .filter(|r| r.from_user_id == Some(user_id) || r.to_user_id == Some(user_id))
                .filter(|r| query.status.is_none_or(|s| r.status == s))
                .filter(|r| query.kind.is_none_or(|k| r.kind == k))
                .filter(|r| {
                    query
                        .date_range
                        .is_none_or(|d| r.created_at >= d.cutoff(Utc::now()))
                })
                .filter(|r| {
                    query.amount_range.is_none_or(|a| {
                        let (lo, hi) = a.bounds_paise();
                        r.amount.paise() >= lo && r.amount.paise() <= hi
                    })
                })
                .filter(|r| query.direction.is_none_or(|d| direction_for(r, user_id) == d))
                .collect();
            matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

            let total = matching.len() as i64;
            let page = query.page.unwrap_or(1).max(1);
            let offset = ((page - 1) * HISTORY_PAGE_SIZE) as usize;
            let items = matching
                .into_iter()
                .skip(offset)
                .take(HISTORY_PAGE_SIZE as usize)
                .map(|r| HistoryEntry {
                    txn_ref: r.txn_ref.clone(),
                    kind: r.kind,
                    status: r.status,
                    amount: r.amount.paise(),
                    description: r.description.clone(),
                    direction: direction_for(r, user_id),
                    counterparty: PartyDetail::default(),
                    created_at: r.created_at,
                })
                .collect();

            Ok(HistoryPage {
                items,
                page,
                per_page: HISTORY_PAGE_SIZE,
                total,
            })
        }

        async fn recent_receivers(
            &self,
            user_id: UserId,
            limit: u32,
        ) -> Result<Vec<RecentReceiver>, RepoError> {
            let records = self.records.lock().unwrap();
            let users = self.users.lock().unwrap();
            let mut sorted: Vec<&TransferRecord> = records
                .iter()
                .filter(|r| {
                    r.from_user_id == Some(user_id)
                        && r.status == TransactionStatus::Completed
                        && r.to_user_id.is_some()
                        && r.to_user_id != Some(user_id)
                })
                .collect();
            sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));

            let mut seen: Vec<UserId> = Vec::new();
            let mut out = Vec::new();
            for record in sorted {
                let Some(to) = record.to_user_id else { continue };
                if seen.contains(&to) {
                    continue;
                }
                seen.push(to);
                out.push(RecentReceiver {
                    user_id: Some(to),
                    name: users.get(&to).map(|u| u.name.clone()),
                    upi_address: None,
                    last_paid_at: record.created_at,
                });
                if out.len() as u32 >= limit {
                    break;
                }
            }
            Ok(out)
        }

        async fn enqueue_notification(
            &self,
            notification: &Notification,
        ) -> Result<(), RepoError> {
            self.notifications.lock().unwrap().push(notification.clone());
            Ok(())
        }

        async fn pending_notifications(&self, limit: u32) -> Result<Vec<Notification>, RepoError> {
            Ok(self
                .notifications
                .lock()
                .unwrap()
                .iter()
                .filter(|n| n.status == NotificationStatus::Pending)
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn mark_notification(
            &self,
            id: NotificationId,
            status: NotificationStatus,
        ) -> Result<(), RepoError> {
            let mut notifications = self.notifications.lock().unwrap();
            let notification = notifications
                .iter_mut()
                .find(|n| n.id == id)
                .ok_or(RepoError::NotFound)?;
            notification.status = status;
            notification.attempts += 1;
            if status == NotificationStatus::Sent {
                notification.sent_at = Some(Utc::now());
            }
            Ok(())
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Setup helpers
    // ─────────────────────────────────────────────────────────────────────────────

    fn service() -> LedgerService<MockRepo> {
        LedgerService::new(MockRepo::new())
    }

    async fn register(
        service: &LedgerService<MockRepo>,
        name: &str,
        phone: &str,
    ) -> CallerIdentity {
        let resp = service
            .register(RegisterRequest {
                name: name.into(),
                phone: phone.into(),
                aadhaar: format!("{phone}99"),
                pan: format!("ABCDE{}F", &phone[phone.len() - 4..]),
            })
            .await
            .unwrap();
        CallerIdentity {
            user_id: resp.user_id,
            phone: resp.phone,
        }
    }

    async fn link(
        service: &LedgerService<MockRepo>,
        caller: &CallerIdentity,
        number: &str,
    ) -> AccountResponse {
        let bank_id = service.list_banks().await.unwrap()[0].id;
        service
            .link_account(
                caller,
                LinkAccountRequest {
                    bank_id,
                    account_number: number.into(),
                    account_type: AccountType::Saving,
                    pin: PIN.into(),
                    pin_confirmation: PIN.into(),
                },
            )
            .await
            .unwrap()
    }

    /// Links an account, activates a line on it and sets the line PIN.
    async fn active_line(
        service: &LedgerService<MockRepo>,
        caller: &CallerIdentity,
        number: &str,
    ) -> (AccountResponse, CreditLineResponse) {
        let account = link(service, caller, number).await;
        let line = service
            .activate_bank_line(
                caller,
                ActivateBankLineRequest {
                    account_id: account.id,
                },
            )
            .await
            .unwrap();
        let line = service
            .set_credit_line_pin(
                caller,
                line.id,
                SetPinRequest {
                    pin: PIN.into(),
                    pin_confirmation: PIN.into(),
                },
            )
            .await
            .unwrap();
        (account, line)
    }

    fn transfer_request(amount: i64, pin: &str) -> TransferToAccountRequest {
        TransferToAccountRequest {
            amount,
            from_account_id: None,
            credit_upi: None,
            to_account_id: None,
            upi_address: None,
            phone: None,
            pin: pin.into(),
            description: None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Registration & directory
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_register_issues_working_token() {
        let service = service();

        let resp = service
            .register(RegisterRequest {
                name: "Ravi Kumar".into(),
                phone: "9876543210".into(),
                aadhaar: "123456789012".into(),
                pan: "ABCDE1234F".into(),
            })
            .await
            .unwrap();

        assert!(resp.access_token.starts_with("upi_"));

        let identity = service
            .repo()
            .identity_by_token_digest(&security::hash_token(&resp.access_token))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.user_id, resp.user_id);
        assert_eq!(identity.phone, "9876543210");
    }

    #[tokio::test]
    async fn test_register_duplicate_phone_conflict() {
        let service = service();
        register(&service, "Ravi", "9876543210").await;

        let result = service
            .register(RegisterRequest {
                name: "Another Ravi".into(),
                phone: "9876543210".into(),
                aadhaar: "999988887777".into(),
                pan: "ZYXWV9876K".into(),
            })
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_malformed_pan() {
        let service = service();

        let result = service
            .register(RegisterRequest {
                name: "Ravi".into(),
                phone: "9876543210".into(),
                aadhaar: "123456789012".into(),
                pan: "123".into(),
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_find_ifsc_is_case_insensitive() {
        let service = service();

        let found = service.find_ifsc("sbin0001234").await.unwrap();
        assert_eq!(found.ifsc_code, "SBIN0001234");
        assert_eq!(found.bank_name, "State Bank of India");

        let result = service.find_ifsc("XXXX0000000").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Accounts
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_first_linked_account_is_primary() {
        let service = service();
        let caller = register(&service, "Ravi", "9876543210").await;

        let first = link(&service, &caller, "111122223333").await;
        let second = link(&service, &caller, "444455556666").await;

        assert!(first.is_primary);
        assert!(!second.is_primary);
        assert_eq!(first.masked_account_number, "XXXX XXXX 3333");
        assert_eq!(first.bank_name, "State Bank of India");
        assert!(first.ifsc.is_some());
    }

    #[tokio::test]
    async fn test_link_account_pin_mismatch() {
        let service = service();
        let caller = register(&service, "Ravi", "9876543210").await;
        let bank_id = service.list_banks().await.unwrap()[0].id;

        let result = service
            .link_account(
                &caller,
                LinkAccountRequest {
                    bank_id,
                    account_number: "111122223333".into(),
                    account_type: AccountType::Saving,
                    pin: "4321".into(),
                    pin_confirmation: "4322".into(),
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_link_account_unknown_bank() {
        let service = service();
        let caller = register(&service, "Ravi", "9876543210").await;

        let result = service
            .link_account(
                &caller,
                LinkAccountRequest {
                    bank_id: BankId::new(),
                    account_number: "111122223333".into(),
                    account_type: AccountType::Saving,
                    pin: PIN.into(),
                    pin_confirmation: PIN.into(),
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_account_hides_other_users_rows() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let priya = register(&service, "Priya", "9123456789").await;
        let account = link(&service, &ravi, "111122223333").await;

        assert!(service.get_account(&ravi, account.id).await.is_ok());
        let result = service.get_account(&priya, account.id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Transfers between accounts
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_transfer_moves_money_and_records() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let priya = register(&service, "Priya", "9123456789").await;
        let from = link(&service, &ravi, "111122223333").await;
        let to = link(&service, &priya, "444455556666").await;
        service.repo().seed_balance(from.id, 500_00);

        let resp = service
            .transfer_to_account(
                &ravi,
                TransferToAccountRequest {
                    from_account_id: Some(from.id),
                    to_account_id: Some(to.id),
                    description: Some("rent".into()),
                    ..transfer_request(200_00, PIN)
                },
            )
            .await
            .unwrap();

        assert_eq!(resp.amount, 200_00);
        assert_eq!(resp.kind, TransferKind::Bank);
        assert_eq!(resp.receiver.name.as_deref(), Some("Priya"));
        assert_eq!(
            resp.receiver.masked_account_number.as_deref(),
            Some("XXXX XXXX 6666")
        );

        assert_eq!(service.repo().account_balance(from.id), 300_00);
        assert_eq!(service.repo().account_balance(to.id), 200_00);

        let records = service.repo().recorded();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.status, TransactionStatus::Completed);
        assert_eq!(record.from_user_id, Some(ravi.user_id));
        assert_eq!(record.to_user_id, Some(priya.user_id));
        assert_eq!(record.description.as_deref(), Some("rent"));
        assert_eq!(record.txn_ref, resp.txn_ref);
    }

    #[tokio::test]
    async fn test_transfer_shape_violation_writes_no_record() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let from = link(&service, &ravi, "111122223333").await;

        let result = service
            .transfer_to_account(
                &ravi,
                TransferToAccountRequest {
                    from_account_id: Some(from.id),
                    to_account_id: Some(AccountId::new()),
                    ..transfer_request(0, PIN)
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(service.repo().recorded().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_wrong_pin_records_failure() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let priya = register(&service, "Priya", "9123456789").await;
        let from = link(&service, &ravi, "111122223333").await;
        let to = link(&service, &priya, "444455556666").await;
        service.repo().seed_balance(from.id, 500_00);

        let result = service
            .transfer_to_account(
                &ravi,
                TransferToAccountRequest {
                    from_account_id: Some(from.id),
                    to_account_id: Some(to.id),
                    ..transfer_request(200_00, WRONG_PIN)
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::InvalidCredential)));
        assert_eq!(service.repo().account_balance(from.id), 500_00);
        assert_eq!(service.repo().account_balance(to.id), 0);

        let records = service.repo().recorded();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, TransactionStatus::Failed);
        // Resolution reached the receiver before authorization failed.
        assert_eq!(records[0].to_user_id, Some(priya.user_id));
    }

    #[tokio::test]
    async fn test_transfer_insufficient_funds() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let priya = register(&service, "Priya", "9123456789").await;
        let from = link(&service, &ravi, "111122223333").await;
        let to = link(&service, &priya, "444455556666").await;
        service.repo().seed_balance(from.id, 100_00);

        let result = service
            .transfer_to_account(
                &ravi,
                TransferToAccountRequest {
                    from_account_id: Some(from.id),
                    to_account_id: Some(to.id),
                    ..transfer_request(250_00, PIN)
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(AppError::InsufficientFunds {
                available: 100_00,
                requested: 250_00,
            })
        ));
        assert_eq!(service.repo().account_balance(from.id), 100_00);
        assert_eq!(service.repo().account_balance(to.id), 0);
        assert_eq!(service.repo().recorded()[0].status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_transfer_to_own_account_rejected() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let from = link(&service, &ravi, "111122223333").await;
        service.repo().seed_balance(from.id, 500_00);

        let result = service
            .transfer_to_account(
                &ravi,
                TransferToAccountRequest {
                    from_account_id: Some(from.id),
                    to_account_id: Some(from.id),
                    ..transfer_request(200_00, PIN)
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::InvalidReceiver)));
        assert_eq!(service.repo().account_balance(from.id), 500_00);
        assert_eq!(service.repo().recorded()[0].status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_transfer_from_unowned_account() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let priya = register(&service, "Priya", "9123456789").await;
        let ravi_account = link(&service, &ravi, "111122223333").await;
        let priya_account = link(&service, &priya, "444455556666").await;
        service.repo().seed_balance(priya_account.id, 500_00);

        let result = service
            .transfer_to_account(
                &ravi,
                TransferToAccountRequest {
                    from_account_id: Some(priya_account.id),
                    to_account_id: Some(ravi_account.id),
                    ..transfer_request(200_00, PIN)
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Unauthorized)));
        assert_eq!(service.repo().account_balance(priya_account.id), 500_00);
    }

    #[tokio::test]
    async fn test_transfer_by_phone_hits_primary_and_notifies() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let priya = register(&service, "Priya", "9123456789").await;
        let from = link(&service, &ravi, "111122223333").await;
        let primary = link(&service, &priya, "444455556666").await;
        let secondary = link(&service, &priya, "777788889999").await;
        service.repo().seed_balance(from.id, 500_00);

        let resp = service
            .transfer_to_account(
                &ravi,
                TransferToAccountRequest {
                    from_account_id: Some(from.id),
                    phone: Some("9123456789".into()),
                    ..transfer_request(150_00, PIN)
                },
            )
            .await
            .unwrap();

        assert_eq!(service.repo().account_balance(primary.id), 150_00);
        assert_eq!(service.repo().account_balance(secondary.id), 0);

        let queued = service.repo().queued();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].user_id, priya.user_id);
        assert_eq!(queued[0].title, "Money Received");
        assert!(queued[0].body.contains("Ravi"));
        assert_eq!(queued[0].data["txn_ref"], resp.txn_ref.as_str());
    }

    #[tokio::test]
    async fn test_transfer_by_phone_without_primary_keeps_phone_in_record() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        // Priya is registered but has no accounts, so no primary exists.
        register(&service, "Priya", "9123456789").await;
        let from = link(&service, &ravi, "111122223333").await;
        service.repo().seed_balance(from.id, 500_00);

        let result = service
            .transfer_to_account(
                &ravi,
                TransferToAccountRequest {
                    from_account_id: Some(from.id),
                    phone: Some("9123456789".into()),
                    ..transfer_request(150_00, PIN)
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));

        let records = service.repo().recorded();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, TransactionStatus::Failed);
        // Resolution never found an account, so the record keeps the phone.
        assert!(matches!(&records[0].receiver, PartyRef::Phone { number } if number == "9123456789"));
        assert_eq!(records[0].to_user_id, None);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Credit line transfers
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_credit_line_spend() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let priya = register(&service, "Priya", "9123456789").await;
        let (_, line) = active_line(&service, &ravi, "111122223333").await;
        let to = link(&service, &priya, "444455556666").await;

        let resp = service
            .transfer_to_account(
                &ravi,
                TransferToAccountRequest {
                    credit_upi: Some(line.upi_address.clone()),
                    to_account_id: Some(to.id),
                    ..transfer_request(900_00, PIN)
                },
            )
            .await
            .unwrap();

        assert_eq!(resp.kind, TransferKind::CreditUpi);
        assert_eq!(
            service.repo().line_available(line.id),
            line.available_credit - 900_00
        );
        assert_eq!(service.repo().account_balance(to.id), 900_00);
    }

    #[tokio::test]
    async fn test_inactive_line_cannot_send() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let priya = register(&service, "Priya", "9123456789").await;
        let account = link(&service, &ravi, "111122223333").await;
        let line = service
            .activate_bank_line(
                &ravi,
                ActivateBankLineRequest {
                    account_id: account.id,
                },
            )
            .await
            .unwrap();
        let to = link(&service, &priya, "444455556666").await;

        assert!(!line.is_active);
        let result = service
            .transfer_to_account(
                &ravi,
                TransferToAccountRequest {
                    credit_upi: Some(line.upi_address.clone()),
                    to_account_id: Some(to.id),
                    ..transfer_request(900_00, PIN)
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::InvalidCredential)));
        assert_eq!(service.repo().line_available(line.id), line.available_credit);
    }

    #[tokio::test]
    async fn test_pay_to_credit_line_restores_credit() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let priya = register(&service, "Priya", "9123456789").await;
        let (_, line) = active_line(&service, &ravi, "111122223333").await;
        let priya_account = link(&service, &priya, "444455556666").await;

        // Spend from the line first so a repayment fits under the limit.
        service
            .transfer_to_account(
                &ravi,
                TransferToAccountRequest {
                    credit_upi: Some(line.upi_address.clone()),
                    to_account_id: Some(priya_account.id),
                    ..transfer_request(5_000_00, PIN)
                },
            )
            .await
            .unwrap();
        let queued_before = service.repo().queued().len();

        let resp = service
            .pay_to_credit_line(
                &ravi,
                PayToCreditLineRequest {
                    amount: 2_000_00,
                    from_account_id: Some(priya_account.id),
                    credit_upi: None,
                    to_credit_line_id: line.id,
                    pin: PIN.into(),
                    description: None,
                },
            )
            .await;
        // Priya owns the paying account, so this must be rejected.
        assert!(matches!(resp, Err(AppError::Unauthorized)));

        let resp = service
            .pay_to_credit_line(
                &priya,
                PayToCreditLineRequest {
                    amount: 2_000_00,
                    from_account_id: Some(priya_account.id),
                    credit_upi: None,
                    to_credit_line_id: line.id,
                    pin: PIN.into(),
                    description: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(
            service.repo().line_available(line.id),
            line.available_credit - 5_000_00 + 2_000_00
        );
        assert_eq!(service.repo().account_balance(priya_account.id), 3_000_00);
        assert!(matches!(
            service
                .repo()
                .find_transaction_by_ref(&resp.txn_ref)
                .await
                .unwrap()
                .unwrap()
                .receiver,
            PartyRef::Bank { .. }
        ));
        // Bill payments do not notify anyone.
        assert_eq!(service.repo().queued().len(), queued_before);
    }

    #[tokio::test]
    async fn test_fresh_line_rejects_repayment() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let (account, line) = active_line(&service, &ravi, "111122223333").await;
        service.repo().seed_balance(account.id, 10_000_00);

        // Nothing has been spent, so any repayment would exceed the limit.
        let result = service
            .pay_to_credit_line(
                &ravi,
                PayToCreditLineRequest {
                    amount: 100,
                    from_account_id: Some(account.id),
                    credit_upi: None,
                    to_credit_line_id: line.id,
                    pin: PIN.into(),
                    description: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::CreditLimitExceeded)));
        assert_eq!(service.repo().account_balance(account.id), 10_000_00);
        assert_eq!(service.repo().recorded()[0].status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_line_cannot_pay_line_with_other_anchor() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let priya = register(&service, "Priya", "9123456789").await;
        let (_, ravi_line) = active_line(&service, &ravi, "111122223333").await;
        let (_, priya_line) = active_line(&service, &priya, "444455556666").await;

        let result = service
            .pay_to_credit_line(
                &ravi,
                PayToCreditLineRequest {
                    amount: 100_00,
                    from_account_id: None,
                    credit_upi: Some(ravi_line.upi_address.clone()),
                    to_credit_line_id: priya_line.id,
                    pin: PIN.into(),
                    description: None,
                },
            )
            .await;

        eprintln!("TEMP-DEBUG actual result: {result:?}");
        assert!(matches!(result, Err(AppError::Unauthorized)));
        assert_eq!(
            service.repo().line_available(ravi_line.id),
            ravi_line.available_credit
        );
    }

    #[tokio::test]
    async fn test_pay_to_unknown_line_leaves_no_record() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let account = link(&service, &ravi, "111122223333").await;
        service.repo().seed_balance(account.id, 500_00);

        let result = service
            .pay_to_credit_line(
                &ravi,
                PayToCreditLineRequest {
                    amount: 100_00,
                    from_account_id: Some(account.id),
                    credit_upi: None,
                    to_credit_line_id: CreditLineId::new(),
                    pin: PIN.into(),
                    description: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(service.repo().recorded().is_empty());
    }

    #[tokio::test]
    async fn test_network_line_cannot_be_paid() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let priya = register(&service, "Priya", "9123456789").await;
        let account = link(&service, &ravi, "111122223333").await;
        service.repo().seed_balance(account.id, 500_00);
        let network = service.activate_network_line(&priya).await.unwrap();

        let result = service
            .pay_to_credit_line(
                &ravi,
                PayToCreditLineRequest {
                    amount: 100_00,
                    from_account_id: Some(account.id),
                    credit_upi: None,
                    to_credit_line_id: network.id,
                    pin: PIN.into(),
                    description: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(service.repo().recorded().is_empty());
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Credit line lifecycle
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_activate_bank_line_requires_owned_account() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let priya = register(&service, "Priya", "9123456789").await;
        let priya_account = link(&service, &priya, "444455556666").await;

        let result = service
            .activate_bank_line(
                &ravi,
                ActivateBankLineRequest {
                    account_id: priya_account.id,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_bank_line_conflict() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let account = link(&service, &ravi, "111122223333").await;
        let req = ActivateBankLineRequest {
            account_id: account.id,
        };

        service.activate_bank_line(&ravi, req.clone()).await.unwrap();
        let result = service.activate_bank_line(&ravi, req).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_one_network_line_per_user() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;

        let line = service.activate_network_line(&ravi).await.unwrap();
        assert_eq!(line.kind, CreditLineKind::Network);
        assert!(line.anchor_account_id.is_none());
        assert!(line.bank_name.is_none());

        let result = service.activate_network_line(&ravi).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_set_pin_activates_line() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let account = link(&service, &ravi, "111122223333").await;
        let line = service
            .activate_bank_line(
                &ravi,
                ActivateBankLineRequest {
                    account_id: account.id,
                },
            )
            .await
            .unwrap();
        assert!(!line.is_active);

        let result = service
            .set_credit_line_pin(
                &ravi,
                line.id,
                SetPinRequest {
                    pin: PIN.into(),
                    pin_confirmation: "0000".into(),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let line = service
            .set_credit_line_pin(
                &ravi,
                line.id,
                SetPinRequest {
                    pin: PIN.into(),
                    pin_confirmation: PIN.into(),
                },
            )
            .await
            .unwrap();
        assert!(line.is_active);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Balance
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_balance_checks_ownership_and_pin() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let priya = register(&service, "Priya", "9123456789").await;
        let account = link(&service, &ravi, "111122223333").await;
        service.repo().seed_balance(account.id, 1234_00);

        let result = service
            .balance(
                &ravi,
                BalanceRequest {
                    source_id: *account.id.as_uuid(),
                    pin: WRONG_PIN.into(),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::InvalidCredential)));

        let result = service
            .balance(
                &priya,
                BalanceRequest {
                    source_id: *account.id.as_uuid(),
                    pin: PIN.into(),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        for _ in 0..2 {
            let resp = service
                .balance(
                    &ravi,
                    BalanceRequest {
                        source_id: *account.id.as_uuid(),
                        pin: PIN.into(),
                    },
                )
                .await
                .unwrap();
            assert_eq!(resp.available, 1234_00);
        }
    }

    #[tokio::test]
    async fn test_balance_of_credit_line() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let (_, line) = active_line(&service, &ravi, "111122223333").await;

        let resp = service
            .balance(
                &ravi,
                BalanceRequest {
                    source_id: *line.id.as_uuid(),
                    pin: PIN.into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(resp.available, line.available_credit);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Records
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_transaction_detail_roles() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let priya = register(&service, "Priya", "9123456789").await;
        let stranger = register(&service, "Amit", "9000011111").await;
        let from = link(&service, &ravi, "111122223333").await;
        let to = link(&service, &priya, "444455556666").await;
        service.repo().seed_balance(from.id, 500_00);

        let resp = service
            .transfer_to_account(
                &ravi,
                TransferToAccountRequest {
                    from_account_id: Some(from.id),
                    to_account_id: Some(to.id),
                    ..transfer_request(200_00, PIN)
                },
            )
            .await
            .unwrap();

        let detail = service
            .transaction_detail(&ravi, resp.txn_ref.as_str())
            .await
            .unwrap();
        assert_eq!(detail.role, TransactionRole::Sender);
        assert_eq!(detail.amount, 200_00);
        assert_eq!(detail.receiver.name.as_deref(), Some("Priya"));
        assert_eq!(
            detail.receiver.masked_account_number.as_deref(),
            Some("XXXX XXXX 6666")
        );

        let detail = service
            .transaction_detail(&priya, resp.txn_ref.as_str())
            .await
            .unwrap();
        assert_eq!(detail.role, TransactionRole::Receiver);
        assert_eq!(detail.sender.name.as_deref(), Some("Ravi"));

        let result = service
            .transaction_detail(&stranger, resp.txn_ref.as_str())
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_transaction_detail_rejects_malformed_ref() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;

        let result = service.transaction_detail(&ravi, "not-a-ref").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_history_directions_and_filters() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let priya = register(&service, "Priya", "9123456789").await;
        let from = link(&service, &ravi, "111122223333").await;
        let to = link(&service, &priya, "444455556666").await;
        service.repo().seed_balance(from.id, 1_000_00);

        for amount in [100_00, 200_00, 300_00] {
            service
                .transfer_to_account(
                    &ravi,
                    TransferToAccountRequest {
                        from_account_id: Some(from.id),
                        to_account_id: Some(to.id),
                        ..transfer_request(amount, PIN)
                    },
                )
                .await
                .unwrap();
        }

        let page = service.history(&ravi, HistoryQuery::default()).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 3);
        // Newest first.
        assert_eq!(page.items[0].amount, 300_00);
        assert!(page.items.iter().all(|e| e.direction == Direction::SendMoney));

        let page = service.history(&priya, HistoryQuery::default()).await.unwrap();
        assert!(page
            .items
            .iter()
            .all(|e| e.direction == Direction::ReceiveMoney));

        let page = service
            .history(
                &ravi,
                HistoryQuery {
                    status: Some(TransactionStatus::Failed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total, 0);

        let page = service
            .history(
                &ravi,
                HistoryQuery {
                    page: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_recent_receivers_distinct_newest_first() {
        let service = service();
        let ravi = register(&service, "Ravi", "9876543210").await;
        let priya = register(&service, "Priya", "9123456789").await;
        let amit = register(&service, "Amit", "9000011111").await;
        let from = link(&service, &ravi, "111122223333").await;
        let priya_account = link(&service, &priya, "444455556666").await;
        let amit_account = link(&service, &amit, "777788889999").await;
        service.repo().seed_balance(from.id, 1_000_00);

        for to in [priya_account.id, amit_account.id, priya_account.id] {
            service
                .transfer_to_account(
                    &ravi,
                    TransferToAccountRequest {
                        from_account_id: Some(from.id),
                        to_account_id: Some(to),
                        ..transfer_request(100_00, PIN)
                    },
                )
                .await
                .unwrap();
        }

        let receivers = service.recent_receivers(&ravi).await.unwrap();
        assert_eq!(receivers.len(), 2);
        assert_eq!(receivers[0].name.as_deref(), Some("Priya"));
        assert_eq!(receivers[1].name.as_deref(), Some("Amit"));
    }
}

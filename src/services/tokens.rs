use log::info;
use std::sync::Arc;

use crate::error::{GameError, GameResult};
use crate::models::UserAccount;
use crate::store::{DocKey, Store, Transaction, Write};

/// Take `amount` tokens from an account about to be written back
pub fn debit(account: &mut UserAccount, amount: u32) -> GameResult<()> {
    account.tokens = account
        .tokens
        .checked_sub(amount)
        .ok_or(GameError::InsufficientTokens {
            balance: account.tokens,
        })?;
    Ok(())
}

/// Per-user token balances
#[derive(Clone)]
pub struct TokenLedger {
    store: Arc<dyn Store>,
}

impl TokenLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Unknown users have a balance of zero
    pub async fn balance(&self, user_id: &str) -> GameResult<u32> {
        let user = self.store.user(user_id).await?;
        Ok(user.value.map(|account| account.tokens).unwrap_or(0))
    }

    /// Add tokens, creating the account if needed; returns the new balance
    pub async fn credit(&self, user_id: &str, amount: u32) -> GameResult<u32> {
        if amount == 0 {
            return Err(GameError::InvalidAmount(amount));
        }

        let user = self.store.user(user_id).await?;
        let mut account = user
            .value
            .unwrap_or_else(|| UserAccount::new(user_id, user_id));
        account.tokens = account
            .tokens
            .checked_add(amount)
            .ok_or(GameError::InvalidAmount(amount))?;
        let balance = account.tokens;

        self.store
            .commit(
                Transaction::new()
                    .expect(DocKey::User(user_id.to_string()), user.version)
                    .write(Write::SetUser(account)),
            )
            .await?;

        info!("Credited {} token(s) to {}, balance {}", amount, user_id, balance);
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;

    #[test]
    fn debit_refuses_to_overdraw() {
        let mut account = UserAccount::new("u1", "Ann");
        account.tokens = 1;
        debit(&mut account, 1).unwrap();
        assert_eq!(account.tokens, 0);

        let err = debit(&mut account, 1).unwrap_err();
        assert!(matches!(err, GameError::InsufficientTokens { balance: 0 }));
        assert_eq!(account.tokens, 0);
    }

    #[actix_rt::test]
    async fn credit_creates_missing_accounts() {
        let ledger = TokenLedger::new(Arc::new(MemoryStore::new(Arc::new(
            ManualClock::default(),
        ))));
        assert_eq!(ledger.balance("u1").await.unwrap(), 0);
        assert_eq!(ledger.credit("u1", 3).await.unwrap(), 3);
        assert_eq!(ledger.credit("u1", 2).await.unwrap(), 5);
        assert_eq!(ledger.balance("u1").await.unwrap(), 5);
    }

    #[actix_rt::test]
    async fn zero_credit_is_rejected() {
        let ledger = TokenLedger::new(Arc::new(MemoryStore::new(Arc::new(
            ManualClock::default(),
        ))));
        assert!(matches!(
            ledger.credit("u1", 0).await,
            Err(GameError::InvalidAmount(0))
        ));
    }
}

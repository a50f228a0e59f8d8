// src/escrow.rs

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ethers::{
    abi::{Abi, parse_abi},
    contract::Contract,
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, H256, Transaction, TransactionReceipt, U64, U256},
};

use crate::{
    config::{Config, DEPOSIT_WINDOW_SECS, REQUIRED_DEPOSIT_WEI},
    error::AppError,
};

/// Client for the escrow contract: verifies deposit transactions via
/// JSON-RPC reads and triggers the single refund call.
///
/// Both paths are deliberately single-shot. There is no retry or
/// reconciliation; a failed refund call leaves the claim consumed and the
/// error in the logs.
#[derive(Clone)]
pub struct EscrowClient {
    provider: Provider<Http>,
    contract_address: Address,
    signer: LocalWallet,
    abi: Abi,
}

impl EscrowClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| AppError::InternalServerError(format!("Bad RPC URL: {}", e)))?;

        let contract_address = config
            .escrow_address
            .parse::<Address>()
            .map_err(|e| AppError::InternalServerError(format!("Bad escrow address: {}", e)))?;

        let signer = config
            .escrow_signer_key
            .parse::<LocalWallet>()
            .map_err(|e| AppError::InternalServerError(format!("Bad signer key: {}", e)))?;

        let abi = parse_abi(&["function refund(address depositor) external"])
            .map_err(|e| AppError::InternalServerError(format!("Bad escrow ABI: {}", e)))?;

        Ok(Self {
            provider,
            contract_address,
            signer,
            abi,
        })
    }

    /// Verifies that `tx_hash` is a confirmed deposit from `wallet_address`
    /// to the escrow contract, of at least the required value, mined within
    /// the past hour.
    pub async fn verify_deposit(
        &self,
        tx_hash: &str,
        wallet_address: &str,
    ) -> Result<(), AppError> {
        let hash = tx_hash
            .parse::<H256>()
            .map_err(|_| AppError::BadRequest("Invalid transaction hash".to_string()))?;
        let depositor = wallet_address
            .parse::<Address>()
            .map_err(|_| AppError::BadRequest("Invalid wallet address".to_string()))?;

        let tx = self
            .provider
            .get_transaction(hash)
            .await
            .map_err(|e| AppError::Upstream(format!("get_transaction failed: {}", e)))?
            .ok_or_else(|| invalid_deposit("transaction not found"))?;

        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| AppError::Upstream(format!("get_transaction_receipt failed: {}", e)))?
            .ok_or_else(|| invalid_deposit("transaction not yet mined"))?;

        let block_number = receipt
            .block_number
            .ok_or_else(|| invalid_deposit("receipt carries no block number"))?;

        let block = self
            .provider
            .get_block(block_number)
            .await
            .map_err(|e| AppError::Upstream(format!("get_block failed: {}", e)))?
            .ok_or_else(|| invalid_deposit("containing block not found"))?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AppError::InternalServerError(e.to_string()))?
            .as_secs();

        check_deposit(
            &tx,
            &receipt,
            block.timestamp.as_u64(),
            now,
            depositor,
            self.contract_address,
            U256::from(REQUIRED_DEPOSIT_WEI),
            DEPOSIT_WINDOW_SECS,
        )
        .map_err(invalid_deposit)
    }

    /// Invokes the escrow contract's refund method for `depositor`.
    /// Returns the hash of the submitted transaction without waiting for
    /// confirmation.
    pub async fn refund(&self, depositor: &str) -> Result<H256, AppError> {
        let depositor = depositor
            .parse::<Address>()
            .map_err(|_| AppError::BadRequest("Invalid wallet address".to_string()))?;

        let chain_id = self
            .provider
            .get_chainid()
            .await
            .map_err(|e| AppError::Upstream(format!("get_chainid failed: {}", e)))?;

        let signer = self.signer.clone().with_chain_id(chain_id.as_u64());
        let client = Arc::new(SignerMiddleware::new(self.provider.clone(), signer));
        let contract = Contract::new(self.contract_address, self.abi.clone(), client);

        let call = contract
            .method::<Address, ()>("refund", depositor)
            .map_err(|e| AppError::InternalServerError(format!("refund call setup: {}", e)))?;

        let pending = call
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("refund call failed: {}", e)))?;

        // PendingTransaction derefs to the submitted transaction's hash.
        Ok(*pending)
    }
}

fn invalid_deposit(reason: &str) -> AppError {
    tracing::error!("Deposit verification failed: {}", reason);
    AppError::BadRequest("Invalid transaction. Please try again.".to_string())
}

/// Pure deposit validation against fetched chain data.
/// Returns the rejection reason, if any.
#[allow(clippy::too_many_arguments)]
fn check_deposit(
    tx: &Transaction,
    receipt: &TransactionReceipt,
    block_timestamp: u64,
    now: u64,
    depositor: Address,
    escrow: Address,
    min_value: U256,
    window_secs: u64,
) -> Result<(), &'static str> {
    if receipt.status != Some(U64::from(1)) {
        return Err("transaction failed or not confirmed");
    }

    if tx.from != depositor {
        return Err("transaction sender does not match wallet address");
    }

    if tx.to != Some(escrow) {
        return Err("transaction recipient does not match escrow contract");
    }

    if tx.value < min_value {
        return Err("transaction value is less than the required deposit");
    }

    if now.saturating_sub(block_timestamp) > window_secs {
        return Err("transaction was not made within the past hour");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depositor() -> Address {
        "0x1111111111111111111111111111111111111111"
            .parse()
            .unwrap()
    }

    fn escrow() -> Address {
        "0x2222222222222222222222222222222222222222"
            .parse()
            .unwrap()
    }

    fn valid_tx() -> Transaction {
        Transaction {
            from: depositor(),
            to: Some(escrow()),
            value: U256::from(REQUIRED_DEPOSIT_WEI),
            ..Default::default()
        }
    }

    fn confirmed_receipt() -> TransactionReceipt {
        TransactionReceipt {
            status: Some(U64::from(1)),
            ..Default::default()
        }
    }

    const NOW: u64 = 1_700_000_000;

    #[test]
    fn accepts_a_valid_recent_deposit() {
        let result = check_deposit(
            &valid_tx(),
            &confirmed_receipt(),
            NOW - 60,
            NOW,
            depositor(),
            escrow(),
            U256::from(REQUIRED_DEPOSIT_WEI),
            DEPOSIT_WINDOW_SECS,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_a_failed_transaction() {
        let receipt = TransactionReceipt {
            status: Some(U64::from(0)),
            ..Default::default()
        };
        let result = check_deposit(
            &valid_tx(),
            &receipt,
            NOW - 60,
            NOW,
            depositor(),
            escrow(),
            U256::from(REQUIRED_DEPOSIT_WEI),
            DEPOSIT_WINDOW_SECS,
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_wrong_sender() {
        let mut tx = valid_tx();
        tx.from = escrow();
        let result = check_deposit(
            &tx,
            &confirmed_receipt(),
            NOW - 60,
            NOW,
            depositor(),
            escrow(),
            U256::from(REQUIRED_DEPOSIT_WEI),
            DEPOSIT_WINDOW_SECS,
        );
        assert_eq!(result, Err("transaction sender does not match wallet address"));
    }

    #[test]
    fn rejects_wrong_recipient() {
        let mut tx = valid_tx();
        tx.to = Some(depositor());
        let result = check_deposit(
            &tx,
            &confirmed_receipt(),
            NOW - 60,
            NOW,
            depositor(),
            escrow(),
            U256::from(REQUIRED_DEPOSIT_WEI),
            DEPOSIT_WINDOW_SECS,
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_underpayment() {
        let mut tx = valid_tx();
        tx.value = U256::from(REQUIRED_DEPOSIT_WEI - 1);
        let result = check_deposit(
            &tx,
            &confirmed_receipt(),
            NOW - 60,
            NOW,
            depositor(),
            escrow(),
            U256::from(REQUIRED_DEPOSIT_WEI),
            DEPOSIT_WINDOW_SECS,
        );
        assert_eq!(
            result,
            Err("transaction value is less than the required deposit")
        );
    }

    #[test]
    fn rejects_stale_deposit() {
        let result = check_deposit(
            &valid_tx(),
            &confirmed_receipt(),
            NOW - DEPOSIT_WINDOW_SECS - 1,
            NOW,
            depositor(),
            escrow(),
            U256::from(REQUIRED_DEPOSIT_WEI),
            DEPOSIT_WINDOW_SECS,
        );
        assert_eq!(result, Err("transaction was not made within the past hour"));
    }

    #[test]
    fn accepts_exactly_at_window_edge() {
        let result = check_deposit(
            &valid_tx(),
            &confirmed_receipt(),
            NOW - DEPOSIT_WINDOW_SECS,
            NOW,
            depositor(),
            escrow(),
            U256::from(REQUIRED_DEPOSIT_WEI),
            DEPOSIT_WINDOW_SECS,
        );
        assert!(result.is_ok());
    }
}

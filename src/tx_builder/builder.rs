//! Core TxBuilder implementation
//!
//! Turns a typed [`Operation`] into an unsigned v0 transaction:
//! resolve inputs (content hash, mint, holding balance) through the
//! failover pool and content resolver, derive the keyless target, quote a
//! priority fee, plan and compile the instructions, then run the size and
//! frozen-state assertions. A violation comes back as a typed error, never
//! as a half-valid transaction.

use solana_sdk::{
    instruction::Instruction,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::compat::unsigned_transaction;
use crate::config::FeeConfig;
use crate::content::ContentResolver;
use crate::derivation::{DerivedIdentity, Deriver};
use crate::metrics::{metrics, Timer};
use crate::preflight::{assert_message_size, assert_not_frozen, fetch_mint, fetch_token_account};
use crate::rpc_manager::ChainRpc;
use crate::tx_builder::errors::TransactionBuilderError;
use crate::tx_builder::fees::{FeeEstimate, FeeService, FeeTier};
use crate::tx_builder::instructions::{
    associated_token_address, build_memo, burn_checked, create_associated_account_idempotent,
    plan_instructions, transfer_checked,
};
use crate::tx_builder::operation::{
    MemoRecord, Operation, PointerParams, RetireMethod, RetireParams, SealParams,
};
use crate::tx_builder::output::BuiltTransaction;
use crate::types::ContentHash;

/// Program instructions and context for one operation, before budgeting
struct Assembly {
    program_ixs: Vec<Instruction>,
    description: String,
    payer: Pubkey,
    fee_accounts: Vec<Pubkey>,
    derived_identity: Option<DerivedIdentity>,
    content_hash: Option<ContentHash>,
    holding_account: Option<Pubkey>,
}

/// Builds unsigned transactions for seal, retire and pointer updates
pub struct TxBuilder {
    rpc: Arc<dyn ChainRpc>,
    content: Arc<ContentResolver>,
    deriver: Deriver,
    fees: FeeService,
}

impl TxBuilder {
    /// `rpc` should be the failover pool; every chain read goes through it
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        content: Arc<ContentResolver>,
        deriver: Deriver,
        fees: FeeConfig,
    ) -> Self {
        Self {
            rpc,
            content,
            deriver,
            fees: FeeService::new(fees),
        }
    }

    pub fn rpc(&self) -> &Arc<dyn ChainRpc> {
        &self.rpc
    }

    pub fn deriver(&self) -> &Deriver {
        &self.deriver
    }

    pub fn fees(&self) -> &FeeService {
        &self.fees
    }

    /// Build an unsigned transaction for `operation`
    #[instrument(skip(self, operation), fields(op = operation.name(), mint = %operation.mint()))]
    pub async fn build(
        &self,
        operation: &Operation,
        tier: FeeTier,
    ) -> Result<BuiltTransaction, TransactionBuilderError> {
        let timer = Timer::new();

        let assembly = match operation {
            Operation::Seal(params) => self.assemble_seal(params).await?,
            Operation::Retire(params) => self.assemble_retire(params).await?,
            Operation::UpdatePointer(params) => self.assemble_pointer(params)?,
        };

        let quote = self
            .fees
            .quote(self.rpc.as_ref(), &assembly.fee_accounts, tier)
            .await;
        let plan = plan_instructions(
            self.fees.compute_unit_limit(),
            quote.price_micro_lamports,
            assembly.program_ixs,
        )?;

        let blockhash = self.rpc.get_latest_blockhash().await?;
        let message = v0::Message::try_compile(&assembly.payer, &plan.instructions, &[], blockhash)
            .map_err(|e| TransactionBuilderError::Compile(e.to_string()))?;
        let message = VersionedMessage::V0(message);

        let size = assert_message_size(&message)?;
        if let Some(holding) = &assembly.holding_account {
            assert_not_frozen(self.rpc.as_ref(), holding).await?;
        }

        let tx = unsigned_transaction(message);
        let fee = FeeEstimate::new(quote, plan.compute_unit_limit, tx.signatures.len());

        let mut built = BuiltTransaction::new(operation.name(), assembly.description, tx, fee, size);
        built.derived_identity = assembly.derived_identity;
        built.content_hash = assembly.content_hash;
        built.holding_account = assembly.holding_account;

        timer.observe_duration(&metrics().build_latency);
        info!(
            instructions = plan.instructions.len(),
            size_bytes = built.size.size_bytes,
            fee_lamports = built.fee.total_lamports,
            fee_fallback = built.fee.quote.fallback,
            "Transaction built"
        );

        Ok(built)
    }

    async fn assemble_seal(&self, params: &SealParams) -> Result<Assembly, TransactionBuilderError> {
        let hash = match params.content_hash {
            Some(hash) => hash,
            None => {
                let hashed = self.content.compute_content_hash(&params.inscription).await?;
                debug!(
                    inscription = %params.inscription,
                    source = %hashed.source_name,
                    "Content hash auto-filled"
                );
                hashed.hash
            }
        };
        let target = self.deriver.derive(&params.inscription)?;

        let record = MemoRecord::seal(&params.inscription, &params.mint, &hash, &target.pubkey());
        let memo = memo_instruction(&record, &params.authority)?;

        Ok(Assembly {
            program_ixs: vec![memo],
            description: format!(
                "Seal mint {} to inscription {} (sha256 {hash})",
                params.mint, params.inscription
            ),
            payer: params.authority,
            fee_accounts: vec![params.mint],
            derived_identity: Some(target),
            content_hash: Some(hash),
            holding_account: None,
        })
    }

    async fn assemble_retire(&self, params: &RetireParams) -> Result<Assembly, TransactionBuilderError> {
        let (mint, program) = fetch_mint(self.rpc.as_ref(), &params.mint).await?;
        let source = associated_token_address(&params.owner, &params.mint, program);

        let amount = match params.amount {
            Some(amount) => amount,
            None => fetch_token_account(self.rpc.as_ref(), &source).await?.0.amount,
        };
        if amount == 0 {
            return Err(TransactionBuilderError::invalid_parameters(format!(
                "Nothing to retire: amount is zero for holding account {source}"
            )));
        }

        let target = self.deriver.derive(&params.inscription)?;
        let target_key = target.pubkey();

        let (mut program_ixs, description, memo_to) = match params.method {
            RetireMethod::Teleburn => {
                let destination = associated_token_address(&target_key, &params.mint, program);
                let ixs = vec![
                    create_associated_account_idempotent(&params.owner, &target_key, &params.mint, program),
                    transfer_checked(
                        program,
                        &source,
                        &params.mint,
                        &destination,
                        &params.owner,
                        amount,
                        mint.decimals,
                    ),
                ];
                let description = format!(
                    "Teleburn {amount} of mint {} to keyless address {target_key} for inscription {}",
                    params.mint, params.inscription
                );
                (ixs, description, Some(target_key))
            }
            RetireMethod::Burn => {
                let ixs = vec![burn_checked(
                    program,
                    &source,
                    &params.mint,
                    &params.owner,
                    amount,
                    mint.decimals,
                )];
                let description = format!(
                    "Burn {amount} of mint {} for inscription {}",
                    params.mint, params.inscription
                );
                (ixs, description, None)
            }
        };

        let record = MemoRecord::retire(
            &params.inscription,
            &params.mint,
            params.method,
            amount,
            memo_to.as_ref(),
        );
        program_ixs.push(memo_instruction(&record, &params.owner)?);

        Ok(Assembly {
            program_ixs,
            description,
            payer: params.owner,
            fee_accounts: vec![params.mint, source],
            derived_identity: Some(target),
            content_hash: None,
            holding_account: Some(source),
        })
    }

    fn assemble_pointer(&self, params: &PointerParams) -> Result<Assembly, TransactionBuilderError> {
        let record = MemoRecord::pointer(&params.inscription, &params.mint);
        let memo = memo_instruction(&record, &params.update_authority)?;

        Ok(Assembly {
            program_ixs: vec![memo],
            description: format!(
                "Point mint {} metadata at ord://{}",
                params.mint, params.inscription
            ),
            payer: params.update_authority,
            fee_accounts: vec![params.mint],
            derived_identity: None,
            content_hash: None,
            holding_account: None,
        })
    }
}

fn memo_instruction(record: &MemoRecord, signer: &Pubkey) -> Result<Instruction, TransactionBuilderError> {
    let json = record
        .to_json()
        .map_err(|e| TransactionBuilderError::instruction_failed("memo", e.to_string()))?;
    build_memo(json.as_bytes(), &[signer])
}

impl std::fmt::Debug for TxBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxBuilder")
            .field("rpc", &self.rpc.label())
            .field("domain", &self.deriver.domain().as_str())
            .field("compute_unit_limit", &self.fees.compute_unit_limit())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentSource;
    use crate::derivation::InscriptionId;
    use crate::preflight::{PreflightError, TokenProgram, TOKEN_2022_PROGRAM_ID};
    use crate::test_utils::{fixtures, MockChainRpc, MockContentSource};
    use crate::tx_builder::instructions::MEMO_PROGRAM_ID;
    use std::time::Duration;

    struct Fixture {
        rpc: Arc<MockChainRpc>,
        source: Arc<MockContentSource>,
        builder: TxBuilder,
        mint: Pubkey,
        owner: Pubkey,
        inscription: InscriptionId,
    }

    fn fixture() -> Fixture {
        let rpc = Arc::new(MockChainRpc::new("mock"));
        let source = Arc::new(MockContentSource::new("ordinals.com", 0));
        let content = Arc::new(ContentResolver::new(
            vec![Arc::clone(&source) as Arc<dyn ContentSource>],
            Duration::from_secs(3600),
            Duration::from_secs(5),
            1024 * 1024,
            Duration::from_secs(60),
        ));
        let builder = TxBuilder::new(
            Arc::clone(&rpc) as Arc<dyn ChainRpc>,
            content,
            Deriver::default(),
            FeeConfig::default(),
        );
        Fixture {
            rpc,
            source,
            builder,
            mint: Pubkey::new_unique(),
            owner: Pubkey::new_unique(),
            inscription: format!("{}i0", "a".repeat(64)).parse().unwrap(),
        }
    }

    fn install_holding(f: &Fixture, program: Pubkey, amount: u64, frozen: bool) -> Pubkey {
        f.rpc
            .set_account(f.mint, fixtures::mint_account(0, amount.max(1), Some(Pubkey::new_unique()), program));
        let token_program = TokenProgram::from_owner(&program).unwrap();
        let holding = associated_token_address(&f.owner, &f.mint, token_program);
        f.rpc
            .set_account(holding, fixtures::token_account(f.mint, f.owner, amount, frozen, program));
        holding
    }

    fn memo_text(built: &BuiltTransaction) -> String {
        let message = &built.tx.message;
        let keys = message.static_account_keys();
        let memo = message
            .instructions()
            .iter()
            .find(|ix| keys[ix.program_id_index as usize] == MEMO_PROGRAM_ID)
            .unwrap();
        String::from_utf8(memo.data.clone()).unwrap()
    }

    #[tokio::test]
    async fn test_seal_with_supplied_hash() {
        let f = fixture();
        let hash = ContentHash::digest(b"inscription body");
        let op = Operation::Seal(SealParams {
            mint: f.mint,
            authority: f.owner,
            inscription: f.inscription,
            content_hash: Some(hash),
        });

        let built = f.builder.build(&op, FeeTier::Medium).await.unwrap();
        assert_eq!(built.operation, "seal");
        assert_eq!(built.required_signers, vec![f.owner]);
        assert_eq!(built.tx.signatures.len(), 1);
        assert_eq!(built.tx.message.instructions().len(), 3);
        assert_eq!(built.content_hash, Some(hash));
        assert!(memo_text(&built).contains(&hash.to_hex()));
        assert_eq!(f.source.calls(), 0);

        // Mock returns no samples, so the fallback price applies
        assert!(built.fee.quote.fallback);
        assert_eq!(built.fee.base_fee_lamports, 5_000);
        assert_eq!(*built.tx.message.recent_blockhash(), f.rpc.blockhash());
    }

    #[tokio::test]
    async fn test_seal_auto_fills_hash() {
        let f = fixture();
        f.source.put(f.inscription, b"<svg/>".to_vec());
        let op = Operation::Seal(SealParams {
            mint: f.mint,
            authority: f.owner,
            inscription: f.inscription,
            content_hash: None,
        });

        let built = f.builder.build(&op, FeeTier::Low).await.unwrap();
        assert_eq!(built.content_hash, Some(ContentHash::digest(b"<svg/>")));
        assert_eq!(f.source.calls(), 1);
        let target = built.derived_identity.unwrap();
        assert!(!target.is_on_curve());
        assert!(memo_text(&built).contains(&target.to_string()));
    }

    #[tokio::test]
    async fn test_seal_blocks_on_unresolvable_content() {
        let f = fixture();
        let op = Operation::Seal(SealParams {
            mint: f.mint,
            authority: f.owner,
            inscription: f.inscription,
            content_hash: None,
        });

        let err = f.builder.build(&op, FeeTier::Medium).await.unwrap_err();
        assert!(matches!(err, TransactionBuilderError::Content(_)));
        assert!(err.remediation().is_some());
    }

    #[tokio::test]
    async fn test_retire_teleburn_full_balance() {
        let f = fixture();
        let holding = install_holding(&f, spl_token::id(), 1, false);
        f.rpc.set_fees(vec![100, 200, 300, 400, 500]);

        let op = Operation::Retire(RetireParams {
            mint: f.mint,
            owner: f.owner,
            inscription: f.inscription,
            amount: None,
            method: RetireMethod::Teleburn,
        });
        let built = f.builder.build(&op, FeeTier::High).await.unwrap();

        // limit, price, create ATA, transfer_checked, memo
        assert_eq!(built.tx.message.instructions().len(), 5);
        assert_eq!(built.holding_account, Some(holding));
        assert!(!built.fee.quote.fallback);
        assert!(built.description.starts_with("Teleburn 1 of mint"));

        let target = built.derived_identity.unwrap();
        let memo = memo_text(&built);
        assert!(memo.contains(r#""method":"teleburn""#));
        assert!(memo.contains(&target.to_string()));
    }

    #[tokio::test]
    async fn test_retire_burn_on_token_2022() {
        let f = fixture();
        install_holding(&f, TOKEN_2022_PROGRAM_ID, 3, false);

        let op = Operation::Retire(RetireParams {
            mint: f.mint,
            owner: f.owner,
            inscription: f.inscription,
            amount: Some(3),
            method: RetireMethod::Burn,
        });
        let built = f.builder.build(&op, FeeTier::Medium).await.unwrap();

        let message = &built.tx.message;
        let keys = message.static_account_keys();
        let programs: Vec<Pubkey> = message
            .instructions()
            .iter()
            .map(|ix| keys[ix.program_id_index as usize])
            .collect();
        assert!(programs.contains(&TOKEN_2022_PROGRAM_ID));
        assert!(!programs.contains(&spl_token::id()));
        assert!(memo_text(&built).contains(r#""method":"burn""#));
    }

    #[tokio::test]
    async fn test_retire_frozen_account_is_rejected() {
        let f = fixture();
        install_holding(&f, spl_token::id(), 1, true);

        let op = Operation::Retire(RetireParams {
            mint: f.mint,
            owner: f.owner,
            inscription: f.inscription,
            amount: None,
            method: RetireMethod::Teleburn,
        });
        let err = f.builder.build(&op, FeeTier::Medium).await.unwrap_err();
        assert!(matches!(
            err,
            TransactionBuilderError::Preflight(PreflightError::AccountFrozen { .. })
        ));
        assert!(err.is_policy_violation());
    }

    #[tokio::test]
    async fn test_retire_empty_holding() {
        let f = fixture();
        install_holding(&f, spl_token::id(), 0, false);

        let op = Operation::Retire(RetireParams {
            mint: f.mint,
            owner: f.owner,
            inscription: f.inscription,
            amount: None,
            method: RetireMethod::Teleburn,
        });
        let err = f.builder.build(&op, FeeTier::Medium).await.unwrap_err();
        assert!(matches!(err, TransactionBuilderError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_retire_missing_mint() {
        let f = fixture();
        let op = Operation::Retire(RetireParams {
            mint: f.mint,
            owner: f.owner,
            inscription: f.inscription,
            amount: Some(1),
            method: RetireMethod::Burn,
        });
        let err = f.builder.build(&op, FeeTier::Medium).await.unwrap_err();
        assert!(matches!(
            err,
            TransactionBuilderError::Preflight(PreflightError::AccountNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_pointer_update_signed_by_update_authority() {
        let f = fixture();
        let authority = Pubkey::new_unique();
        let op = Operation::UpdatePointer(PointerParams {
            mint: f.mint,
            update_authority: authority,
            inscription: f.inscription,
        });
        let built = f.builder.build(&op, FeeTier::Medium).await.unwrap();
        assert_eq!(built.required_signers, vec![authority]);
        assert!(memo_text(&built).contains("ord://"));
        assert!(built.derived_identity.is_none());
    }
}

//! Transaction Assembly & Fee Service
//!
//! Builds unsigned transactions for the three operations of a teleburn:
//! sealing a mint to an inscription, retiring its tokens, and pointing its
//! metadata at the inscription.
//!
//! ## Architecture
//!
//! - **errors**: construction error taxonomy with remediation hints
//! - **operation**: closed operation set, typed parameters, memo records
//! - **fees**: percentile priority fees with fallback
//! - **instructions**: instruction planning and order validation
//! - **output**: unsigned transaction plus review data
//! - **builder**: resolve, derive, price, compile, validate
//!
//! ## Instruction layout
//!
//! `SetComputeUnitLimit` → `SetComputeUnitPrice` → program instructions.
//! Anything else is rejected before compilation.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use teleburn::config::Config;
//! use teleburn::content::ContentResolver;
//! use teleburn::derivation::Deriver;
//! use teleburn::rpc_manager::{ChainRpc, RpcPool};
//! use teleburn::tx_builder::{FeeTier, Operation, TxBuilder};
//!
//! # async fn example(op: Operation) -> anyhow::Result<()> {
//! let config = Config::default();
//! let pool = Arc::new(RpcPool::from_config(&config.rpc)?);
//! let content = Arc::new(ContentResolver::from_config(&config.content)?);
//! let builder = TxBuilder::new(pool as Arc<dyn ChainRpc>, content, Deriver::default(), config.fees);
//!
//! let built = builder.build(&op, FeeTier::Medium).await?;
//! println!("{} ({} lamports)", built.description, built.fee.total_lamports);
//! # Ok(())
//! # }
//! ```

// Public API - Error types
pub mod errors;
pub use errors::TransactionBuilderError;

pub mod builder;
pub mod fees;
pub mod instructions;
pub mod operation;
pub mod output;

pub use builder::TxBuilder;
pub use fees::{percentile, FeeEstimate, FeeService, FeeTier, PriceQuote, DEFAULT_COMPUTE_UNIT_LIMIT};
pub use instructions::{check_instruction_order, plan_instructions, InstructionPlan, MEMO_PROGRAM_ID};
pub use operation::{MemoRecord, Operation, PointerParams, RetireMethod, RetireParams, SealParams};
pub use output::{BuildSummary, BuiltTransaction};

//! On-chain program instruction building.
//!
//! The route byte layout is a fixed external contract: the program parses it
//! positionally, and a mismatch is a silent on-chain rejection rather than a
//! local error. Encode exactly, test exhaustively.

use crate::market::Venue;
use crate::tx::fees::{FeePolicy, TransactionCostEstimate};
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_instruction,
};

/// One hop of an arbitrage route: 1-byte venue id + three 32-byte addresses,
/// fixed width, no length prefix. Hop order is execution order.
#[derive(Debug, Clone)]
pub struct RouteHop {
    pub venue: Venue,
    pub token_in: Pubkey,
    pub token_out: Pubkey,
    pub pool: Pubkey,
}

pub const ROUTE_HOP_LEN: usize = 1 + 32 + 32 + 32;

pub fn encode_route(hops: &[RouteHop]) -> Vec<u8> {
    let mut route = Vec::with_capacity(hops.len() * ROUTE_HOP_LEN);
    for hop in hops {
        route.push(hop.venue.id());
        route.extend_from_slice(hop.token_in.as_ref());
        route.extend_from_slice(hop.token_out.as_ref());
        route.extend_from_slice(hop.pool.as_ref());
    }
    route
}

// Anchor instruction discriminators: first 8 bytes of sha256("global:<name>").
const FLASH_ARBITRAGE_DISCRIMINATOR: [u8; 8] = [0x99, 0x1a, 0x26, 0x78, 0x79, 0x2b, 0xa8, 0x68];
const FLASH_SELF_LIQUIDATE_DISCRIMINATOR: [u8; 8] =
    [0x7f, 0x2c, 0x4f, 0x30, 0xe1, 0x50, 0xca, 0x7e];
const REPAY_FLASH_LOAN_DISCRIMINATOR: [u8; 8] = [0x77, 0xef, 0x12, 0x2d, 0xc2, 0x6b, 0x1f, 0xee];

/// `flash_arbitrage(amount, min_profit, dex_route)` — args are borsh-encoded:
/// two u64 little-endian words, then the route as a u32-length-prefixed byte
/// vector.
pub fn flash_arbitrage_instruction(
    program_id: Pubkey,
    payer: Pubkey,
    amount: u64,
    min_profit: u64,
    hops: &[RouteHop],
) -> Instruction {
    let route = encode_route(hops);
    let mut data = Vec::with_capacity(8 + 8 + 8 + 4 + route.len());
    data.extend_from_slice(&FLASH_ARBITRAGE_DISCRIMINATOR);
    data.extend_from_slice(&amount.to_le_bytes());
    data.extend_from_slice(&min_profit.to_le_bytes());
    data.extend_from_slice(&(route.len() as u32).to_le_bytes());
    data.extend_from_slice(&route);
    Instruction {
        program_id,
        accounts: vec![AccountMeta::new(payer, true)],
        data,
    }
}

/// `flash_self_liquidate(amount, min_out)`.
pub fn flash_self_liquidate_instruction(
    program_id: Pubkey,
    payer: Pubkey,
    amount: u64,
    min_out: u64,
) -> Instruction {
    let mut data = Vec::with_capacity(8 + 8 + 8);
    data.extend_from_slice(&FLASH_SELF_LIQUIDATE_DISCRIMINATOR);
    data.extend_from_slice(&amount.to_le_bytes());
    data.extend_from_slice(&min_out.to_le_bytes());
    Instruction {
        program_id,
        accounts: vec![AccountMeta::new(payer, true)],
        data,
    }
}

/// `repay_flash_loan(amount)`.
pub fn repay_flash_loan_instruction(program_id: Pubkey, payer: Pubkey, amount: u64) -> Instruction {
    let mut data = Vec::with_capacity(8 + 8);
    data.extend_from_slice(&REPAY_FLASH_LOAN_DISCRIMINATOR);
    data.extend_from_slice(&amount.to_le_bytes());
    Instruction {
        program_id,
        accounts: vec![AccountMeta::new(payer, true)],
        data,
    }
}

/// Fee coverage: the wallet fronts fees up to the policy cap; any overage is
/// repaid out of loan proceeds via a self-transfer the program recognizes.
fn fee_coverage_instruction(payer: Pubkey, overage: u64) -> Instruction {
    system_instruction::transfer(&payer, &payer, overage)
}

/// Wraps a program call with its fee instructions:
/// compute-budget limit, compute-unit price when a priority fee applies,
/// loan-funded fee coverage when the estimate exceeds the user cap, then the
/// program call itself.
pub fn wrap_with_fee_instructions(
    program_ix: Instruction,
    payer: Pubkey,
    cost: &TransactionCostEstimate,
    policy: &FeePolicy,
) -> Vec<Instruction> {
    let mut instructions = Vec::with_capacity(4);
    instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(
        cost.compute_units,
    ));
    if cost.priority_fee > 0 {
        instructions.push(ComputeBudgetInstruction::set_compute_unit_price(
            cost.priority_fee,
        ));
    }
    let user_fee = (cost.base_fee + cost.priority_fee).min(policy.max_user_fee);
    let overage = cost.total_cost.saturating_sub(user_fee);
    if overage > 0 && policy.covers_overage_from_loan {
        instructions.push(fee_coverage_instruction(payer, overage));
    }
    instructions.push(program_ix);
    instructions
}

/// The fee the wallet itself pays for an attempt, after the policy cap.
pub fn user_fee(cost: &TransactionCostEstimate, policy: &FeePolicy) -> u64 {
    (cost.base_fee + cost.priority_fee).min(policy.max_user_fee)
}

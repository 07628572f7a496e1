use ethers::types::{Address, U256};
use models::{PegError, PegEvent, PegResult};
use tracing::debug;

use super::factory::PairFactory;
use crate::common::{DexContext, SwapRouter};

/// Uniswap V2 风格路由
#[derive(Debug, Clone)]
pub struct V2Router {
    address: Address,
}

impl V2Router {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    fn check_path(path: &[Address]) -> PegResult<()> {
        if path.len() < 2 {
            return Err(PegError::InvalidArgument("swap path needs at least two tokens".to_string()));
        }
        Ok(())
    }

    /// 按储备比例计算等值数量 (quote)
    fn quote(amount_a: U256, reserve_a: U256, reserve_b: U256) -> PegResult<U256> {
        let scaled = amount_a.full_mul(reserve_b) / reserve_a;
        U256::try_from(scaled).map_err(|_| PegError::ArithmeticOverflow("router quote"))
    }
}

impl SwapRouter for V2Router {
    fn address(&self) -> Address {
        self.address
    }

    fn get_amounts_out(&self, factory: &PairFactory, amount_in: U256, path: &[Address]) -> PegResult<Vec<U256>> {
        Self::check_path(path)?;

        let mut amounts = Vec::with_capacity(path.len());
        amounts.push(amount_in);
        for hop in path.windows(2) {
            let pair = factory.get_pair(hop[0], hop[1]).ok_or(PegError::PoolNotFound {
                token_a: hop[0],
                token_b: hop[1],
            })?;
            let last = amounts[amounts.len() - 1];
            amounts.push(pair.get_amount_out(hop[0], last)?);
        }
        Ok(amounts)
    }

    fn swap_exact_tokens_for_tokens(
        &self,
        ctx: &mut DexContext<'_>,
        sender: Address,
        amount_in: U256,
        amount_out_min: U256,
        path: &[Address],
        to: Address,
    ) -> PegResult<Vec<U256>> {
        let amounts = self.get_amounts_out(ctx.factory, amount_in, path)?;
        let amount_out = amounts[amounts.len() - 1];
        if amount_out < amount_out_min || amount_out.is_zero() {
            return Err(PegError::ExternalCallFailure(format!(
                "UniswapV2Router: INSUFFICIENT_OUTPUT_AMOUNT (quoted {}, min {})",
                amount_out, amount_out_min
            )));
        }

        // 输入先转入第一个交易对
        let first_pair = ctx
            .factory
            .get_pair(path[0], path[1])
            .map(|p| p.address)
            .ok_or(PegError::PoolNotFound {
                token_a: path[0],
                token_b: path[1],
            })?;
        ctx.ledger.transfer(path[0], sender, first_pair, amount_in)?;

        for (i, hop) in path.windows(2).enumerate() {
            // 中间跳的输出直接转入下一个交易对
            let recipient = match path.get(i + 2) {
                Some(next) => ctx
                    .factory
                    .get_pair(hop[1], *next)
                    .map(|p| p.address)
                    .ok_or(PegError::PoolNotFound {
                        token_a: hop[1],
                        token_b: *next,
                    })?,
                None => to,
            };

            let pair = ctx.factory.get_pair_mut(hop[0], hop[1]).ok_or(PegError::PoolNotFound {
                token_a: hop[0],
                token_b: hop[1],
            })?;
            let (hop_in, hop_out) = pair.swap(ctx.ledger, hop[0], recipient)?;
            let pair_address = pair.address;

            debug!("兑换 {:?}: {} {:?} -> {} {:?}", pair_address, hop_in, hop[0], hop_out, hop[1]);
            ctx.events.emit(
                pair_address,
                PegEvent::Swap {
                    pair: pair_address,
                    sender,
                    token_in: hop[0],
                    amount_in: hop_in,
                    token_out: hop[1],
                    amount_out: hop_out,
                    to: recipient,
                },
            );
        }

        Ok(amounts)
    }

    fn add_liquidity(
        &self,
        ctx: &mut DexContext<'_>,
        provider: Address,
        token_a: Address,
        token_b: Address,
        amount_a_desired: U256,
        amount_b_desired: U256,
    ) -> PegResult<(U256, U256)> {
        if amount_a_desired.is_zero() || amount_b_desired.is_zero() {
            return Err(PegError::InvalidArgument("liquidity amounts must not be zero".to_string()));
        }
        if ctx.factory.get_pair(token_a, token_b).is_none() {
            ctx.factory.create_pair(token_a, token_b)?;
        }

        let pair = ctx.factory.get_pair(token_a, token_b).ok_or(PegError::PoolNotFound { token_a, token_b })?;
        let (reserve_a, reserve_b) = pair.reserves_for(token_a)?;

        let (amount_a, amount_b) = if reserve_a.is_zero() && reserve_b.is_zero() {
            (amount_a_desired, amount_b_desired)
        } else {
            let amount_b_optimal = Self::quote(amount_a_desired, reserve_a, reserve_b)?;
            if amount_b_optimal <= amount_b_desired {
                (amount_a_desired, amount_b_optimal)
            } else {
                let amount_a_optimal = Self::quote(amount_b_desired, reserve_b, reserve_a)?;
                (amount_a_optimal, amount_b_desired)
            }
        };

        let pair_address = pair.address;
        ctx.ledger.transfer(token_a, provider, pair_address, amount_a)?;
        ctx.ledger.transfer(token_b, provider, pair_address, amount_b)?;

        let pair = ctx.factory.get_pair_mut(token_a, token_b).ok_or(PegError::PoolNotFound { token_a, token_b })?;
        pair.sync(ctx.ledger);
        let (amount0, amount1) = if token_a == pair.token0 {
            (amount_a, amount_b)
        } else {
            (amount_b, amount_a)
        };

        ctx.events.emit(
            pair_address,
            PegEvent::LiquidityAdded {
                pair: pair_address,
                provider,
                amount0,
                amount1,
            },
        );

        Ok((amount_a, amount_b))
    }
}

//! The operation applier.
//!
//! [`apply`] checks one operation's preconditions against the state and the
//! transaction context, performs its writes and returns the [`UndoDelta`]
//! that reverts them. A failing operation leaves the state untouched.

use std::collections::{BTreeMap, BTreeSet};

use dpos_transactions::{
    slate_id, DefineSlateOp, DepositOp, IssueAssetOp, Operation, RegisterAccountOp,
    RegisterAssetOp, RegisterDelegateOp, TransferOp, UpdateAccountOp, UpdateBalanceVoteOp,
    UpdateSigningKeyOp, WithdrawOp, WithdrawPayOp,
};
use dpos_types::{
    AccountId, Address, Amount, AssetId, BalanceId, ChainParams, PublicKey, SlateId, Timestamp,
};

use crate::entries::{
    balance_id, AccountEntry, AssetEntry, BalanceEntry, DelegateInfo, SlateEntry,
};
use crate::error::OpError;
use crate::names::{is_valid_account_name, is_valid_symbol, parent_name};
use crate::state::LedgerState;
use crate::undo::UndoDelta;

/// Largest allowed asset precision.
pub const MAX_PRECISION: u64 = 100_000_000;

/// An active key of all zeroes retracts the account.
pub const RETRACTED_KEY: PublicKey = PublicKey([0u8; 32]);

/// Evaluation context of one transaction: who signed it, the per-asset pool
/// and the fee it owes.
pub struct EvalContext<'a> {
    pub params: &'a ChainParams,
    pub now: Timestamp,
    pub signers: BTreeSet<Address>,
    pool: BTreeMap<AssetId, i128>,
    required_fee: Amount,
    pub created_accounts: Vec<AccountId>,
    pub created_assets: Vec<AssetId>,
    pub created_balances: Vec<BalanceId>,
}

impl<'a> EvalContext<'a> {
    pub fn new(params: &'a ChainParams, now: Timestamp, signers: BTreeSet<Address>) -> Self {
        Self {
            params,
            now,
            signers,
            pool: BTreeMap::new(),
            required_fee: Amount::ZERO,
            created_accounts: Vec::new(),
            created_assets: Vec::new(),
            created_balances: Vec::new(),
        }
    }

    /// Net amount of `asset` in the pool.
    pub fn pool(&self, asset: AssetId) -> i128 {
        self.pool.get(&asset).copied().unwrap_or(0)
    }

    pub fn pool_entries(&self) -> impl Iterator<Item = (AssetId, i128)> + '_ {
        self.pool.iter().map(|(a, v)| (*a, *v))
    }

    /// Registration fees owed by the operations applied so far.
    pub fn required_fee(&self) -> Amount {
        self.required_fee
    }

    fn add_required_fee(&mut self, fee: u64) {
        self.required_fee = self.required_fee + Amount::new(fee);
    }

    fn credit(&mut self, asset: AssetId, amount: Amount) {
        *self.pool.entry(asset).or_insert(0) += i128::from(amount.raw());
    }

    fn debit(&mut self, asset: AssetId, amount: Amount) -> Result<(), OpError> {
        let available = self.pool(asset);
        let needed = i128::from(amount.raw());
        if available < needed {
            return Err(OpError::InsufficientBalance {
                needed: amount,
                available: Amount::new(available.max(0) as u64),
            });
        }
        self.pool.insert(asset, available - needed);
        Ok(())
    }

    fn has_signed(&self, address: &Address) -> bool {
        self.signers.contains(address)
    }

    fn require_signed(&self, address: &Address) -> Result<(), OpError> {
        if self.has_signed(address) {
            Ok(())
        } else {
            Err(OpError::MissingSignature(address.to_string()))
        }
    }

    /// Owner or active key of `account`.
    fn require_account_authority(&self, account: &AccountEntry) -> Result<(), OpError> {
        if self.has_signed(&account.owner_address()) || self.has_signed(&account.active_address()) {
            Ok(())
        } else {
            Err(OpError::MissingSignature(account.name.clone()))
        }
    }
}

/// Apply one operation.
pub fn apply(
    op: &Operation,
    ctx: &mut EvalContext<'_>,
    state: &mut LedgerState,
) -> Result<UndoDelta, OpError> {
    let mut delta = UndoDelta::new();
    let result = match op {
        Operation::Withdraw(op) => apply_withdraw(op, ctx, state, &mut delta),
        Operation::Deposit(op) => apply_deposit(op, ctx, state, &mut delta),
        Operation::Transfer(op) => apply_transfer(op, ctx, state, &mut delta),
        Operation::RegisterAccount(op) => apply_register_account(op, ctx, state, &mut delta),
        Operation::UpdateAccount(op) => apply_update_account(op, ctx, state, &mut delta),
        Operation::RegisterDelegate(op) => apply_register_delegate(op, ctx, state, &mut delta),
        Operation::UpdateSigningKey(op) => apply_update_signing_key(op, ctx, state, &mut delta),
        Operation::WithdrawPay(op) => apply_withdraw_pay(op, ctx, state, &mut delta),
        Operation::RegisterAsset(op) => apply_register_asset(op, ctx, state, &mut delta),
        Operation::IssueAsset(op) => apply_issue_asset(op, ctx, state, &mut delta),
        Operation::DefineSlate(op) => apply_define_slate(op, state, &mut delta),
        Operation::UpdateBalanceVote(op) => apply_update_balance_vote(op, ctx, state, &mut delta),
    };
    match result {
        Ok(()) => Ok(delta),
        Err(e) => {
            state.unapply(delta);
            Err(e)
        }
    }
}

/// Revert an operation applied by [`apply`].
pub fn unapply(delta: UndoDelta, state: &mut LedgerState) {
    state.unapply(delta);
}

// ── Balances ────────────────────────────────────────────────────────────

fn existing_balance(state: &LedgerState, id: &BalanceId) -> Result<BalanceEntry, OpError> {
    state
        .balance(id)
        .cloned()
        .ok_or_else(|| OpError::unknown("balance", id))
}

fn take_from(balance: &BalanceEntry, amount: Amount) -> Result<Amount, OpError> {
    balance
        .amount
        .checked_sub(amount)
        .ok_or(OpError::InsufficientBalance {
            needed: amount,
            available: balance.amount,
        })
}

/// Add or remove base-asset votes for every delegate of `slate`.
fn adjust_votes(
    state: &mut LedgerState,
    slate: Option<SlateId>,
    asset: AssetId,
    amount: Amount,
    increase: bool,
    delta: &mut UndoDelta,
) -> Result<(), OpError> {
    let Some(slate) = slate else { return Ok(()) };
    if !asset.is_base() || amount.is_zero() {
        return Ok(());
    }
    let delegates = state
        .slate(&slate)
        .map(|s| s.delegates.clone())
        .ok_or_else(|| OpError::unknown("slate", slate))?;
    for id in delegates {
        let Some(mut account) = state.account(id).cloned() else {
            continue;
        };
        if let Some(info) = account.delegate_info.as_mut() {
            info.votes_for = if increase {
                info.votes_for + amount
            } else {
                info.votes_for.saturating_sub(amount)
            };
            state.put_account(account, delta);
        }
    }
    Ok(())
}

/// Deposit `amount` into the balance `(owner, asset, slate)`, creating it
/// when absent.
fn deposit_into(
    state: &mut LedgerState,
    ctx: &mut EvalContext<'_>,
    owner: Address,
    asset_id: AssetId,
    slate: Option<SlateId>,
    amount: Amount,
    delta: &mut UndoDelta,
) -> Result<(), OpError> {
    let id = balance_id(&owner, asset_id, slate);
    let entry = match state.balance(&id) {
        Some(existing) => BalanceEntry {
            amount: existing
                .amount
                .checked_add(amount)
                .ok_or_else(|| OpError::Malformed("balance overflow".into()))?,
            last_update: ctx.now,
            ..existing.clone()
        },
        None => {
            ctx.created_balances.push(id);
            BalanceEntry {
                id,
                owner,
                asset_id,
                amount,
                slate,
                last_update: ctx.now,
            }
        }
    };
    adjust_votes(state, slate, asset_id, amount, true, delta)?;
    state.put_balance(entry, delta);
    Ok(())
}

fn apply_withdraw(
    op: &WithdrawOp,
    ctx: &mut EvalContext<'_>,
    state: &mut LedgerState,
    delta: &mut UndoDelta,
) -> Result<(), OpError> {
    let balance = existing_balance(state, &op.balance_id)?;
    ctx.require_signed(&balance.owner)?;
    let remaining = take_from(&balance, op.amount)?;

    adjust_votes(state, balance.slate, balance.asset_id, op.amount, false, delta)?;
    ctx.credit(balance.asset_id, op.amount);
    state.put_balance(
        BalanceEntry {
            amount: remaining,
            last_update: ctx.now,
            ..balance
        },
        delta,
    );
    Ok(())
}

fn apply_deposit(
    op: &DepositOp,
    ctx: &mut EvalContext<'_>,
    state: &mut LedgerState,
    delta: &mut UndoDelta,
) -> Result<(), OpError> {
    if state.asset(op.asset_id).is_none() {
        return Err(OpError::unknown("asset", op.asset_id));
    }
    if let Some(slate) = &op.slate {
        if state.slate(slate).is_none() {
            return Err(OpError::unknown("slate", slate));
        }
    }
    ctx.debit(op.asset_id, op.amount)?;
    deposit_into(state, ctx, op.owner, op.asset_id, op.slate, op.amount, delta)
}

fn apply_transfer(
    op: &TransferOp,
    ctx: &mut EvalContext<'_>,
    state: &mut LedgerState,
    delta: &mut UndoDelta,
) -> Result<(), OpError> {
    let source = existing_balance(state, &op.from)?;
    ctx.require_signed(&source.owner)?;
    if balance_id(&op.to, source.asset_id, source.slate) == op.from {
        return Err(OpError::Malformed("transfer to the source balance".into()));
    }
    let remaining = take_from(&source, op.amount)?;

    adjust_votes(state, source.slate, source.asset_id, op.amount, false, delta)?;
    let (asset_id, slate) = (source.asset_id, source.slate);
    state.put_balance(
        BalanceEntry {
            amount: remaining,
            last_update: ctx.now,
            ..source
        },
        delta,
    );
    deposit_into(state, ctx, op.to, asset_id, slate, op.amount, delta)
}

fn apply_update_balance_vote(
    op: &UpdateBalanceVoteOp,
    ctx: &mut EvalContext<'_>,
    state: &mut LedgerState,
    delta: &mut UndoDelta,
) -> Result<(), OpError> {
    let balance = existing_balance(state, &op.balance_id)?;
    ctx.require_signed(&balance.owner)?;
    if let Some(slate) = &op.slate {
        if state.slate(slate).is_none() {
            return Err(OpError::unknown("slate", slate));
        }
    }
    if balance_id(&balance.owner, balance.asset_id, op.slate) == balance.id {
        return Err(OpError::Malformed("balance already votes for this slate".into()));
    }

    let amount = balance.amount;
    let (owner, asset_id) = (balance.owner, balance.asset_id);
    adjust_votes(state, balance.slate, asset_id, amount, false, delta)?;
    state.put_balance(
        BalanceEntry {
            amount: Amount::ZERO,
            last_update: ctx.now,
            ..balance
        },
        delta,
    );
    deposit_into(state, ctx, owner, asset_id, op.slate, amount, delta)
}

// ── Accounts and delegates ──────────────────────────────────────────────

fn existing_account(state: &LedgerState, id: AccountId) -> Result<AccountEntry, OpError> {
    state
        .account(id)
        .cloned()
        .ok_or_else(|| OpError::unknown("account", id))
}

fn require_not_retracted(account: &AccountEntry) -> Result<(), OpError> {
    if account.retracted {
        Err(OpError::Unauthorized(format!("account {} is retracted", account.name)))
    } else {
        Ok(())
    }
}

fn check_pay_rate(pay_rate: u8) -> Result<(), OpError> {
    if pay_rate > 100 {
        Err(OpError::Malformed(format!("pay rate {} exceeds 100", pay_rate)))
    } else {
        Ok(())
    }
}

fn apply_register_account(
    op: &RegisterAccountOp,
    ctx: &mut EvalContext<'_>,
    state: &mut LedgerState,
    delta: &mut UndoDelta,
) -> Result<(), OpError> {
    if !is_valid_account_name(&op.name) {
        return Err(OpError::Malformed(format!("invalid account name '{}'", op.name)));
    }
    if state.account_by_name(&op.name).is_some() {
        return Err(OpError::exists("account", &op.name));
    }
    if let Some(parent) = parent_name(&op.name) {
        let parent = state
            .account_by_name(parent)
            .ok_or_else(|| OpError::unknown("account", parent))?;
        ctx.require_account_authority(parent)?;
    }

    let delegate_info = match op.delegate_pay_rate {
        Some(rate) => {
            check_pay_rate(rate)?;
            ctx.add_required_fee(ctx.params.delegate_registration_fee);
            Some(DelegateInfo::new(rate, op.active_key))
        }
        None => None,
    };

    let id = AccountId(state.properties().last_account_id + 1);
    state.update_properties(delta, |p| p.last_account_id = id.0);
    state.put_account(
        AccountEntry {
            id,
            name: op.name.clone(),
            owner_key: op.owner_key,
            active_key: op.active_key,
            registration_date: ctx.now,
            last_update: ctx.now,
            delegate_info,
            retracted: false,
        },
        delta,
    );
    ctx.created_accounts.push(id);
    Ok(())
}

fn apply_update_account(
    op: &UpdateAccountOp,
    ctx: &mut EvalContext<'_>,
    state: &mut LedgerState,
    delta: &mut UndoDelta,
) -> Result<(), OpError> {
    let mut account = existing_account(state, op.account_id)?;
    require_not_retracted(&account)?;
    ctx.require_signed(&account.owner_address())?;

    account.active_key = op.active_key;
    account.retracted = op.active_key == RETRACTED_KEY;
    account.last_update = ctx.now;
    state.put_account(account, delta);
    Ok(())
}

fn apply_register_delegate(
    op: &RegisterDelegateOp,
    ctx: &mut EvalContext<'_>,
    state: &mut LedgerState,
    delta: &mut UndoDelta,
) -> Result<(), OpError> {
    let mut account = existing_account(state, op.account_id)?;
    require_not_retracted(&account)?;
    ctx.require_account_authority(&account)?;
    if account.is_delegate() {
        return Err(OpError::exists("delegate", &account.name));
    }
    check_pay_rate(op.pay_rate)?;

    ctx.add_required_fee(ctx.params.delegate_registration_fee);
    account.delegate_info = Some(DelegateInfo::new(op.pay_rate, account.active_key));
    account.last_update = ctx.now;
    state.put_account(account, delta);
    Ok(())
}

fn delegate_info_mut(account: &mut AccountEntry) -> Result<&mut DelegateInfo, OpError> {
    let name = account.name.clone();
    account
        .delegate_info
        .as_mut()
        .ok_or_else(|| OpError::unknown("delegate", name))
}

fn apply_update_signing_key(
    op: &UpdateSigningKeyOp,
    ctx: &mut EvalContext<'_>,
    state: &mut LedgerState,
    delta: &mut UndoDelta,
) -> Result<(), OpError> {
    let mut account = existing_account(state, op.account_id)?;
    require_not_retracted(&account)?;
    ctx.require_account_authority(&account)?;
    delegate_info_mut(&mut account)?.signing_key = op.signing_key;
    account.last_update = ctx.now;
    state.put_account(account, delta);
    Ok(())
}

fn apply_withdraw_pay(
    op: &WithdrawPayOp,
    ctx: &mut EvalContext<'_>,
    state: &mut LedgerState,
    delta: &mut UndoDelta,
) -> Result<(), OpError> {
    let mut account = existing_account(state, op.account_id)?;
    ctx.require_account_authority(&account)?;
    let info = delegate_info_mut(&mut account)?;
    info.pay_balance = info
        .pay_balance
        .checked_sub(op.amount)
        .ok_or(OpError::InsufficientBalance {
            needed: op.amount,
            available: info.pay_balance,
        })?;
    info.votes_for = info.votes_for.saturating_sub(op.amount);
    account.last_update = ctx.now;

    ctx.credit(AssetId::BASE, op.amount);
    state.put_account(account, delta);
    Ok(())
}

// ── Assets ──────────────────────────────────────────────────────────────

fn is_valid_precision(precision: u64) -> bool {
    let mut p = 1u64;
    while p <= MAX_PRECISION {
        if p == precision {
            return true;
        }
        p *= 10;
    }
    false
}

fn apply_register_asset(
    op: &RegisterAssetOp,
    ctx: &mut EvalContext<'_>,
    state: &mut LedgerState,
    delta: &mut UndoDelta,
) -> Result<(), OpError> {
    if !is_valid_symbol(&op.symbol) {
        return Err(OpError::Malformed(format!("invalid asset symbol '{}'", op.symbol)));
    }
    if state.asset_by_symbol(&op.symbol).is_some() {
        return Err(OpError::exists("asset", &op.symbol));
    }
    let issuer = existing_account(state, op.issuer)?;
    require_not_retracted(&issuer)?;
    ctx.require_account_authority(&issuer)?;
    if op.max_supply.is_zero() || op.max_supply.raw() > ctx.params.max_asset_supply {
        return Err(OpError::Malformed(format!(
            "max supply {} outside 1..={}",
            op.max_supply, ctx.params.max_asset_supply
        )));
    }
    if !is_valid_precision(op.precision) {
        return Err(OpError::Malformed(format!(
            "precision {} is not a power of ten up to {}",
            op.precision, MAX_PRECISION
        )));
    }

    ctx.add_required_fee(ctx.params.asset_registration_fee);
    let id = AssetId(state.properties().last_asset_id + 1);
    state.update_properties(delta, |p| p.last_asset_id = id.0);
    state.put_asset(
        AssetEntry {
            id,
            symbol: op.symbol.clone(),
            name: op.name.clone(),
            issuer: Some(op.issuer),
            precision: op.precision,
            max_supply: op.max_supply,
            current_supply: Amount::ZERO,
            collected_fees: Amount::ZERO,
            registration_date: ctx.now,
        },
        delta,
    );
    ctx.created_assets.push(id);
    Ok(())
}

fn apply_issue_asset(
    op: &IssueAssetOp,
    ctx: &mut EvalContext<'_>,
    state: &mut LedgerState,
    delta: &mut UndoDelta,
) -> Result<(), OpError> {
    let mut asset = state
        .asset(op.asset_id)
        .cloned()
        .ok_or_else(|| OpError::unknown("asset", op.asset_id))?;
    let issuer_id = asset
        .issuer
        .ok_or_else(|| OpError::Unauthorized(format!("asset {} has no issuer", asset.symbol)))?;
    let issuer = existing_account(state, issuer_id)?;
    ctx.require_account_authority(&issuer)?;

    let supply = asset
        .current_supply
        .checked_add(op.amount)
        .filter(|s| *s <= asset.max_supply)
        .ok_or(OpError::SupplyExceeded {
            current: asset.current_supply,
            requested: op.amount,
            max: asset.max_supply,
        })?;
    asset.current_supply = supply;

    ctx.credit(asset.id, op.amount);
    state.put_asset(asset, delta);
    Ok(())
}

// ── Slates ──────────────────────────────────────────────────────────────

fn apply_define_slate(
    op: &DefineSlateOp,
    state: &mut LedgerState,
    delta: &mut UndoDelta,
) -> Result<(), OpError> {
    if op.delegates.is_empty() {
        return Err(OpError::Malformed("slate has no delegates".into()));
    }
    for id in &op.delegates {
        match state.account(*id) {
            Some(account) if account.is_delegate() => {}
            _ => return Err(OpError::unknown("delegate", id)),
        }
    }
    let id = slate_id(&op.delegates);
    if state.slate(&id).is_some() {
        return Ok(());
    }
    let mut delegates = op.delegates.clone();
    delegates.sort_unstable();
    state.put_slate(SlateEntry { id, delegates }, delta);
    Ok(())
}

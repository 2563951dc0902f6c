use super::{fetch, CrmService, Outcome};
use crate::credentials::SessionContext;
use crate::db::{Client, Contract};
use crate::error::{AuthError, AuthResult};
use crate::permissions::{require_contract_owner, Action};
use crate::validation::validate_amount;
use chrono::Utc;
use log::info;

#[derive(Debug, Clone)]
pub struct NewContract {
    pub client_id: u64,
    /// Defaults to the client's commercial contact
    pub commercial_contact_id: Option<u64>,
    pub total_amount: f64,
    pub amount_due: f64,
    pub signed: bool,
}

/// Fields left `None` are unchanged
#[derive(Debug, Clone, Default)]
pub struct ContractChanges {
    pub total_amount: Option<f64>,
    pub amount_due: Option<f64>,
    pub signed: Option<bool>,
}

/// Both flags set means contracts that are unsigned *and* unpaid
#[derive(Debug, Clone, Copy, Default)]
pub struct ContractFilter {
    pub unsigned: bool,
    pub unpaid: bool,
}

impl ContractFilter {
    pub fn matches(&self, contract: &Contract) -> bool {
        (!self.unsigned || !contract.signed) && (!self.unpaid || contract.amount_due > 0.0)
    }
}

fn check_amounts(total_amount: f64, amount_due: f64) -> AuthResult<()> {
    validate_amount("total_amount", total_amount)?;
    validate_amount("amount_due", amount_due)?;
    if amount_due > total_amount {
        return Err(AuthError::validation("amount_due cannot exceed total_amount"));
    }
    Ok(())
}

impl CrmService {
    pub fn create_contract(&self, ctx: &SessionContext, new: NewContract) -> AuthResult<Outcome<Contract>> {
        self.run(ctx, Action::CreateContract, |user, session| {
            check_amounts(new.total_amount, new.amount_due)?;
            let client: Client = fetch(session, new.client_id)?;

            let mut contract = Contract {
                id: 0,
                client_id: client.id,
                commercial_contact_id: new.commercial_contact_id.or(client.commercial_contact_id),
                total_amount: new.total_amount,
                amount_due: new.amount_due,
                date_created: Utc::now().date_naive(),
                signed: new.signed,
            };
            session.insert(&mut contract)?;
            info!(
                "{} created contract {} for client {}",
                user.username, contract.id, client.id
            );
            Ok(contract)
        })
    }

    /// Commercial users may update only their own contracts; Gestion any
    pub fn update_contract(
        &self,
        ctx: &SessionContext,
        contract_id: u64,
        changes: ContractChanges,
    ) -> AuthResult<Outcome<Contract>> {
        self.run(ctx, Action::UpdateContract, |user, session| {
            let mut contract: Contract = fetch(session, contract_id)?;
            require_contract_owner(user, &contract)?;

            if let Some(total_amount) = changes.total_amount {
                contract.total_amount = total_amount;
            }
            if let Some(amount_due) = changes.amount_due {
                contract.amount_due = amount_due;
            }
            if let Some(signed) = changes.signed {
                contract.signed = signed;
            }
            check_amounts(contract.total_amount, contract.amount_due)?;

            session.update(&contract)?;
            info!("{} updated contract {}", user.username, contract.id);
            Ok(contract)
        })
    }

    pub fn filter_contracts(
        &self,
        ctx: &SessionContext,
        filter: ContractFilter,
    ) -> AuthResult<Outcome<Vec<Contract>>> {
        self.run(ctx, Action::FilterContracts, |_, session| {
            session.filter::<Contract, _>(|c| filter.matches(c))
        })
    }

    pub fn list_contracts(&self, ctx: &SessionContext) -> AuthResult<Outcome<Vec<Contract>>> {
        self.read(ctx, "list_contracts", |_, session| session.all::<Contract>())
    }
}

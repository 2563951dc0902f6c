use super::{fetch, CrmService, Outcome};
use crate::credentials::SessionContext;
use crate::db::Client;
use crate::error::AuthResult;
use crate::permissions::{require_client_owner, Action};
use crate::validation::{validate_email, validate_not_empty, validate_phone};
use chrono::{NaiveDate, Utc};
use log::info;

#[derive(Debug, Clone)]
pub struct NewClient {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub company_name: Option<String>,
}

/// Fields left `None` are unchanged
#[derive(Debug, Clone, Default)]
pub struct ClientChanges {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub last_contact_date: Option<NaiveDate>,
}

impl CrmService {
    /// Register a client; the caller becomes its commercial contact
    pub fn create_client(&self, ctx: &SessionContext, new: NewClient) -> AuthResult<Outcome<Client>> {
        self.run(ctx, Action::CreateClient, |user, session| {
            validate_not_empty("full_name", &new.full_name)?;
            validate_email(&new.email)?;
            validate_phone(&new.phone)?;

            let mut client = Client {
                id: 0,
                full_name: new.full_name,
                email: new.email,
                phone: new.phone,
                company_name: new.company_name,
                date_created: Utc::now().date_naive(),
                last_contact_date: None,
                commercial_contact_id: Some(user.id),
            };
            session.insert(&mut client)?;
            info!("{} created client {}", user.username, client.id);
            Ok(client)
        })
    }

    /// Only the client's commercial contact may update it
    pub fn update_client(
        &self,
        ctx: &SessionContext,
        client_id: u64,
        changes: ClientChanges,
    ) -> AuthResult<Outcome<Client>> {
        self.run(ctx, Action::UpdateClient, |user, session| {
            let mut client: Client = fetch(session, client_id)?;
            require_client_owner(user, &client)?;

            if let Some(full_name) = changes.full_name {
                validate_not_empty("full_name", &full_name)?;
                client.full_name = full_name;
            }
            if let Some(email) = changes.email {
                validate_email(&email)?;
                client.email = email;
            }
            if let Some(phone) = changes.phone {
                validate_phone(&phone)?;
                client.phone = phone;
            }
            if let Some(company_name) = changes.company_name {
                client.company_name = Some(company_name);
            }
            if let Some(date) = changes.last_contact_date {
                client.last_contact_date = Some(date);
            }

            session.update(&client)?;
            info!("{} updated client {}", user.username, client.id);
            Ok(client)
        })
    }

    pub fn list_clients(&self, ctx: &SessionContext) -> AuthResult<Outcome<Vec<Client>>> {
        self.read(ctx, "list_clients", |_, session| session.all::<Client>())
    }
}

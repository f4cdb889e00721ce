use chrono::{DateTime, Utc};
use doc_store::Update;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::info;

use super::{PrivacyStatus, User, UserDynamo, UserStatus};
use crate::clients::{PushEndpointClient, SearchClient};
use crate::error::UserError;
use crate::models::card::CardManager;

static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_.]{3,30}$").expect("Invalid username regex"));

/// Profile attributes a user may edit. `None` leaves the attribute as is, an
/// empty string removes it.
#[derive(Debug, Clone, Default)]
pub struct UserDetails {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

impl UserDetails {
    fn to_update(&self) -> Update {
        let mut update = Update::new();
        for (attribute, value) in [
            ("fullName", &self.full_name),
            ("email", &self.email),
            ("phoneNumber", &self.phone_number),
        ] {
            update = match value.as_deref() {
                None => update,
                Some("") => update.remove(attribute),
                Some(value) => update.set(attribute, value),
            };
        }
        update
    }
}

#[derive(Clone)]
pub struct UserManager {
    dynamo: UserDynamo,
    pub(super) card_manager: CardManager,
    pub(super) search_client: Option<Arc<dyn SearchClient>>,
    pub(super) push_client: Option<Arc<dyn PushEndpointClient>>,
}

impl UserManager {
    pub fn new(
        dynamo: UserDynamo,
        card_manager: CardManager,
        search_client: Option<Arc<dyn SearchClient>>,
        push_client: Option<Arc<dyn PushEndpointClient>>,
    ) -> Self {
        Self {
            dynamo,
            card_manager,
            search_client,
            push_client,
        }
    }

    pub fn dynamo(&self) -> &UserDynamo {
        &self.dynamo
    }

    pub async fn create_user(
        &self,
        user_id: &str,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<User, UserError> {
        if !USERNAME_REGEX.is_match(username) {
            return Err(UserError::InvalidUsername(username.to_string()));
        }
        if self.dynamo.get_user_by_username(username).await?.is_some() {
            return Err(UserError::UsernameTaken(username.to_string()));
        }
        let user = match self.dynamo.add_user(user_id, username, now).await {
            Ok(user) => user,
            Err(err) if err.is_conditional_check_failed() => {
                return Err(UserError::UserAlreadyExists(user_id.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        info!(user_id = %user_id, username = %username, "Created user");
        Ok(user)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, UserError> {
        Ok(self.dynamo.get_user(user_id, false).await?)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, UserError> {
        Ok(self.dynamo.get_user_by_username(username).await?)
    }

    pub(super) fn map_missing(user_id: &str, err: doc_store::StoreError) -> UserError {
        if err.is_conditional_check_failed() {
            UserError::UserDoesNotExist(user_id.to_string())
        } else {
            err.into()
        }
    }

    pub async fn set_privacy_status(
        &self,
        user_id: &str,
        status: PrivacyStatus,
    ) -> Result<User, UserError> {
        self.dynamo
            .set_privacy_status(user_id, status)
            .await
            .map_err(|err| Self::map_missing(user_id, err))
    }

    pub async fn set_user_status(&self, user_id: &str, status: UserStatus) -> Result<User, UserError> {
        let user = self
            .dynamo
            .set_user_status(user_id, status)
            .await
            .map_err(|err| Self::map_missing(user_id, err))?;
        info!(user_id = %user_id, status = status.as_str(), "Set user status");
        Ok(user)
    }

    pub async fn set_contact_details(
        &self,
        user_id: &str,
        details: &UserDetails,
    ) -> Result<User, UserError> {
        let update = details.to_update();
        if update.is_empty() {
            return self
                .get_user(user_id)
                .await?
                .ok_or_else(|| UserError::UserDoesNotExist(user_id.to_string()));
        }
        self.dynamo
            .update_details(user_id, update)
            .await
            .map_err(|err| Self::map_missing(user_id, err))
    }
}

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::{PaymentError, PaymentResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    pub fn from_claim(role: &str) -> Self {
        match role {
            "admin" | "service_role" => Role::Admin,
            _ => Role::Customer,
        }
    }
}

/// The authenticated caller of one request, passed explicitly into use cases.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn ensure_active(&self, now: DateTime<Utc>) -> PaymentResult<()> {
        if now >= self.expires_at {
            return Err(PaymentError::Forbidden);
        }
        Ok(())
    }

    pub fn require_admin(&self, now: DateTime<Utc>) -> PaymentResult<()> {
        self.ensure_active(now)?;
        if !self.is_admin() {
            return Err(PaymentError::Forbidden);
        }
        Ok(())
    }

    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.is_admin() || self.user_id == owner_id
    }

    pub fn actor_label(&self) -> String {
        format!("admin:{}", self.user_id)
    }
}

/// Who is driving a session change.
#[derive(Debug, Clone)]
pub enum Actor {
    Admin(AuthContext),
    /// A verified provider notification.
    Webhook { payment_id: String },
}

impl Actor {
    pub fn label(&self) -> String {
        match self {
            Actor::Admin(context) => context.actor_label(),
            Actor::Webhook { payment_id } => format!("webhook:{}", payment_id),
        }
    }

    pub fn authorize(&self, now: DateTime<Utc>) -> PaymentResult<()> {
        match self {
            Actor::Admin(context) => context.require_admin(now),
            Actor::Webhook { .. } => Ok(()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn context(role: Role, expires_in: i64) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            email: None,
            role,
            expires_at: Utc::now() + Duration::seconds(expires_in),
        }
    }

    #[test]
    fn expired_context_is_rejected() {
        let ctx = context(Role::Admin, -1);
        assert!(matches!(
            ctx.require_admin(Utc::now()),
            Err(PaymentError::Forbidden)
        ));
    }

    #[test]
    fn customers_are_not_admins() {
        let ctx = context(Role::Customer, 60);
        assert!(ctx.ensure_active(Utc::now()).is_ok());
        assert!(ctx.require_admin(Utc::now()).is_err());
        assert!(ctx.can_access(ctx.user_id));
        assert!(!ctx.can_access(Uuid::new_v4()));
    }

    #[test]
    fn webhook_actor_needs_no_login() {
        let actor = Actor::Webhook {
            payment_id: "pay_1".to_string(),
        };
        assert_eq!(actor.label(), "webhook:pay_1");
        assert!(actor.authorize(Utc::now()).is_ok());

        let customer = Actor::Admin(context(Role::Customer, 60));
        assert!(customer.authorize(Utc::now()).is_err());
    }

    #[test]
    fn service_role_maps_to_admin() {
        assert_eq!(Role::from_claim("service_role"), Role::Admin);
        assert_eq!(Role::from_claim("authenticated"), Role::Customer);
    }
}

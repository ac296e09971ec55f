use crate::auth::AuthContext;
use crate::domain::customer::Customer;
use crate::domain::ServiceError;
use crate::store::CustomerStore;

/// The customer whose identity reference equals the token subject.
pub async fn logged_customer(
    customers: &dyn CustomerStore,
    auth: &AuthContext,
) -> Result<Customer, ServiceError> {
    match customers.find_by_external_id(&auth.subject).await? {
        Some(customer) => Ok(customer),
        None => {
            tracing::warn!(subject = %auth.subject, "No customer linked to authenticated subject");
            Err(ServiceError::RecordNotFound(format!("customer for subject {}", auth.subject)))
        }
    }
}

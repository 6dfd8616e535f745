use super::error::BusinessError;
use super::types::*;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Nullable, Text, Timestamptz, Uuid as DieselUuid};
use log::{error, info};
use uuid::Uuid;

use crate::core::shared::utils::{looks_like_email, non_empty, with_conn, DbPool};

#[derive(QueryableByName)]
struct BusinessRow {
    #[diesel(sql_type = DieselUuid)]
    id: Uuid,
    #[diesel(sql_type = Nullable<DieselUuid>)]
    owner_id: Option<Uuid>,
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = Nullable<Text>)]
    email: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    phone: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    address: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    description: Option<String>,
    #[diesel(sql_type = Text)]
    timezone: String,
    #[diesel(sql_type = Timestamptz)]
    created_at: DateTime<Utc>,
    #[diesel(sql_type = Timestamptz)]
    updated_at: DateTime<Utc>,
}

impl From<BusinessRow> for BusinessProfile {
    fn from(row: BusinessRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            description: row.description,
            timezone: row.timezone,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const BUSINESS_COLUMNS: &str = "id, owner_id, name, email, phone, address, description, timezone, created_at, updated_at";

/// Loads a business on an existing connection; shared with the other domain services.
pub fn load_business(conn: &mut PgConnection, business_id: Uuid) -> Result<BusinessProfile, BusinessError> {
    let sql = format!("SELECT {BUSINESS_COLUMNS} FROM business_profiles WHERE id = $1");
    let rows: Vec<BusinessRow> = diesel::sql_query(sql)
        .bind::<DieselUuid, _>(business_id)
        .load(conn)?;
    rows.into_iter()
        .next()
        .map(BusinessProfile::from)
        .ok_or(BusinessError::NotFound)
}

pub struct BusinessService {
    pool: DbPool,
}

impl BusinessService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create_business(
        &self,
        request: CreateBusinessRequest,
    ) -> Result<BusinessProfile, BusinessError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(BusinessError::Validation("Business name is required".to_string()));
        }
        let email = non_empty(request.email);
        validate_email(email.as_deref())?;
        let timezone = non_empty(request.timezone).unwrap_or_else(|| "UTC".to_string());
        validate_timezone(&timezone)?;

        let id = Uuid::new_v4();
        let phone = non_empty(request.phone);
        let address = non_empty(request.address);
        let description = non_empty(request.description);

        let business = with_conn(&self.pool, move |conn| {
            diesel::sql_query(
                r#"
                INSERT INTO business_profiles (
                    id, owner_id, name, email, phone, address, description, timezone,
                    created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
                "#,
            )
            .bind::<DieselUuid, _>(id)
            .bind::<Nullable<DieselUuid>, _>(request.owner_id)
            .bind::<Text, _>(&name)
            .bind::<Nullable<Text>, _>(email.as_deref())
            .bind::<Nullable<Text>, _>(phone.as_deref())
            .bind::<Nullable<Text>, _>(address.as_deref())
            .bind::<Nullable<Text>, _>(description.as_deref())
            .bind::<Text, _>(&timezone)
            .execute(conn)
            .map_err(|e| {
                error!("Failed to create business: {e}");
                BusinessError::from(e)
            })?;
            load_business(conn, id)
        })
        .await?;

        info!("Created business {} ({})", business.name, business.id);
        Ok(business)
    }

    pub async fn get_business(&self, business_id: Uuid) -> Result<BusinessProfile, BusinessError> {
        with_conn(&self.pool, move |conn| load_business(conn, business_id)).await
    }

    pub async fn list_businesses(
        &self,
        query: BusinessListQuery,
    ) -> Result<Vec<BusinessProfile>, BusinessError> {
        with_conn(&self.pool, move |conn| -> Result<_, BusinessError> {
            let rows: Vec<BusinessRow> = match query.owner_id {
                Some(owner_id) => diesel::sql_query(format!(
                    "SELECT {BUSINESS_COLUMNS} FROM business_profiles WHERE owner_id = $1 ORDER BY name"
                ))
                .bind::<DieselUuid, _>(owner_id)
                .load(conn)?,
                None => diesel::sql_query(format!(
                    "SELECT {BUSINESS_COLUMNS} FROM business_profiles ORDER BY name"
                ))
                .load(conn)?,
            };
            Ok(rows.into_iter().map(BusinessProfile::from).collect())
        })
        .await
    }

    pub async fn update_business(
        &self,
        business_id: Uuid,
        request: UpdateBusinessRequest,
    ) -> Result<BusinessProfile, BusinessError> {
        if let Some(name) = &request.name {
            if name.trim().is_empty() {
                return Err(BusinessError::Validation("Business name cannot be empty".to_string()));
            }
        }
        validate_email(request.email.as_deref().filter(|e| !e.trim().is_empty()))?;
        if let Some(tz) = &request.timezone {
            validate_timezone(tz)?;
        }

        with_conn(&self.pool, move |conn| {
            let current = load_business(conn, business_id)?;
            let merged = BusinessProfile {
                name: request.name.map(|n| n.trim().to_string()).unwrap_or(current.name),
                email: merge_optional(request.email, current.email),
                phone: merge_optional(request.phone, current.phone),
                address: merge_optional(request.address, current.address),
                description: merge_optional(request.description, current.description),
                timezone: request
                    .timezone
                    .map(|t| t.trim().to_string())
                    .unwrap_or(current.timezone),
                ..current
            };

            diesel::sql_query(
                r#"
                UPDATE business_profiles
                SET name = $2, email = $3, phone = $4, address = $5, description = $6,
                    timezone = $7, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind::<DieselUuid, _>(business_id)
            .bind::<Text, _>(&merged.name)
            .bind::<Nullable<Text>, _>(merged.email.as_deref())
            .bind::<Nullable<Text>, _>(merged.phone.as_deref())
            .bind::<Nullable<Text>, _>(merged.address.as_deref())
            .bind::<Nullable<Text>, _>(merged.description.as_deref())
            .bind::<Text, _>(&merged.timezone)
            .execute(conn)?;

            load_business(conn, business_id)
        })
        .await
    }

    pub async fn delete_business(&self, business_id: Uuid) -> Result<(), BusinessError> {
        let deleted = with_conn(&self.pool, move |conn| {
            diesel::sql_query("DELETE FROM business_profiles WHERE id = $1")
                .bind::<DieselUuid, _>(business_id)
                .execute(conn)
                .map_err(BusinessError::from)
        })
        .await?;

        if deleted == 0 {
            return Err(BusinessError::NotFound);
        }
        info!("Deleted business {business_id}");
        Ok(())
    }
}

/// `Some("")` clears the field, `None` keeps the current value.
fn merge_optional(update: Option<String>, current: Option<String>) -> Option<String> {
    match update {
        Some(value) => non_empty(Some(value)),
        None => current,
    }
}

fn validate_email(email: Option<&str>) -> Result<(), BusinessError> {
    match email {
        Some(e) if !looks_like_email(e) => Err(BusinessError::Validation(format!(
            "Invalid email address '{e}'"
        ))),
        _ => Ok(()),
    }
}

fn validate_timezone(timezone: &str) -> Result<(), BusinessError> {
    if parse_timezone(timezone).is_none() {
        return Err(BusinessError::Validation(format!(
            "Unsupported timezone '{timezone}', use UTC or an offset such as +02:00"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_optional() {
        assert_eq!(
            merge_optional(None, Some("old".to_string())),
            Some("old".to_string())
        );
        assert_eq!(merge_optional(Some(String::new()), Some("old".to_string())), None);
        assert_eq!(
            merge_optional(Some("new".to_string()), None),
            Some("new".to_string())
        );
    }

    #[test]
    fn test_validate_timezone() {
        assert!(validate_timezone("+01:00").is_ok());
        assert!(matches!(
            validate_timezone("Mars/Olympus"),
            Err(BusinessError::Validation(_))
        ));
    }
}

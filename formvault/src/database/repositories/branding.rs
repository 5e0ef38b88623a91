use crate::config::BRANDING_KEY;
use crate::database::{BrandingRecord, BrandingUpdate, Collection, Store};
use crate::error::Result;
use crate::validation::{ensure_valid, validate_branding};
use chrono::Utc;

/// Singleton company branding; absence means first run
#[derive(Clone)]
pub struct BrandingRepository {
    store: Store,
}

impl BrandingRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Merge the given fields into the branding record and refresh `updatedAt`.
    pub async fn save(&self, update: BrandingUpdate) -> Result<BrandingRecord> {
        let mut record = self.get().await?.unwrap_or_default();

        let BrandingUpdate {
            company_name,
            email,
            phone,
            website,
            ein,
            address,
        } = update;

        let fields = [
            (&mut record.company_name, company_name),
            (&mut record.email, email),
            (&mut record.phone, phone),
            (&mut record.website, website),
            (&mut record.ein, ein),
            (&mut record.address, address),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                *field = value;
            }
        }

        record.id = BRANDING_KEY.to_string();
        record.updated_at = Some(Utc::now());

        ensure_valid(validate_branding(&record))?;

        self.store.upsert(Collection::Branding, &record).await?;

        tracing::debug!("Saved branding for {}", record.company_name);
        Ok(record)
    }

    pub async fn get(&self) -> Result<Option<BrandingRecord>> {
        self.store.get(Collection::Branding, BRANDING_KEY).await
    }
}

// ABOUTME: Version-driven migration runner with full-store rollback on failure.
// ABOUTME: Selects migrations by comparing dot-separated versions and records the new version on success.

use crate::error::StoreError;
use crate::kv::KeyValueStore;
use crate::persistence::Persistence;

type MigrationAction<S> = Box<dyn Fn(&mut Persistence<S>) -> anyhow::Result<()>>;

/// A one-shot data transformation tagged with the version that introduced it.
pub struct Migration<S> {
    version: String,
    action: MigrationAction<S>,
}

impl<S> Migration<S> {
    pub fn new<F>(version: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut Persistence<S>) -> anyhow::Result<()> + 'static,
    {
        Self {
            version: version.into(),
            action: Box::new(action),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl<S> std::fmt::Debug for Migration<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// What a call to [`Persistence::migrate`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Version recorded before the run, `None` for legacy stores.
    pub from: Option<String>,
    pub to: String,
    /// Versions of the migrations that ran to completion, in order.
    pub applied: Vec<String>,
    /// Version of the migration that failed and was rolled back. Only set
    /// when `log_errors` absorbed the failure.
    pub failed: Option<String>,
}

impl MigrationReport {
    pub fn is_up_to_date(&self) -> bool {
        self.failed.is_none()
    }
}

/// Decide whether the migration tagged `migration_version` runs when moving
/// a store at `db_version` to `app_version`.
///
/// Runs when the migration targets exactly `app_version`, when the store has
/// never recorded a version, or when `migration_version` is newer than
/// `db_version`. Newer means the first differing numeric component is larger,
/// or `db_version` runs out of components first. Components that are not
/// numbers never decide the comparison.
pub fn should_apply_migration(
    app_version: &str,
    db_version: Option<&str>,
    migration_version: &str,
) -> bool {
    if migration_version == app_version {
        return true;
    }
    let Some(db_version) = db_version else {
        return true;
    };

    let db_parts: Vec<&str> = db_version.split('.').collect();
    for (i, part) in migration_version.split('.').enumerate() {
        let Some(db_part) = db_parts.get(i) else {
            return true;
        };
        match (part.parse::<u64>(), db_part.parse::<u64>()) {
            (Ok(ours), Ok(theirs)) if ours > theirs => return true,
            (Ok(ours), Ok(theirs)) if ours < theirs => return false,
            _ => {}
        }
    }
    false
}

impl<S: KeyValueStore> Persistence<S> {
    /// Bring the store to `app_version`, running every applicable migration
    /// in list order.
    ///
    /// Each migration runs against a snapshot of the whole store. If it
    /// fails, the snapshot is restored, the remaining migrations are skipped,
    /// the version is left as it was, and [`StoreError::MigrationFailed`] is
    /// raised (or logged, under `log_errors`).
    pub fn migrate(
        &mut self,
        migrations: &[Migration<S>],
        app_version: &str,
    ) -> Result<MigrationReport, StoreError> {
        let from = self.version()?;
        let mut report = MigrationReport {
            from: from.clone(),
            to: app_version.to_string(),
            applied: Vec::new(),
            failed: None,
        };

        if from.as_deref() == Some(app_version) {
            tracing::debug!("store already at version {}", app_version);
            return Ok(report);
        }

        let selected: Vec<&Migration<S>> = migrations
            .iter()
            .filter(|m| should_apply_migration(app_version, from.as_deref(), &m.version))
            .collect();

        tracing::info!(
            "migrating store from {} to {}: {} of {} migrations apply",
            from.as_deref().unwrap_or("(none)"),
            app_version,
            selected.len(),
            migrations.len()
        );

        for migration in selected {
            let snapshot = self.store().snapshot()?;

            if let Err(err) = (migration.action)(self) {
                self.store_mut().restore(&snapshot)?;
                tracing::warn!(
                    "migration {} failed, store rolled back",
                    migration.version
                );
                self.absorb(StoreError::MigrationFailed {
                    version: migration.version.clone(),
                    reason: format!("{:#}", err),
                })?;
                report.failed = Some(migration.version.clone());
                return Ok(report);
            }

            tracing::info!("applied migration {}", migration.version);
            report.applied.push(migration.version.clone());
        }

        self.set_version(app_version)?;
        Ok(report)
    }
}

use uuid::Uuid;

use crate::commands::{async_runtime, exit, load_config, CommandResult};
use tourlead_core::domain::tenant::{PlanTier, Tenant};
use tourlead_db::{Store, StoreError};

const API_KEY_PREFIX: &str = "tl_";

pub fn run(name: &str, plan: &str) -> CommandResult {
    let name = name.trim();
    if name.is_empty() {
        return CommandResult::failure(
            "seed",
            "invalid_argument",
            "agency name must not be empty",
            exit::INVALID_ARGUMENT,
        );
    }
    let plan: PlanTier = match plan.parse() {
        Ok(plan) => plan,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "invalid_argument",
                error.to_string(),
                exit::INVALID_ARGUMENT,
            );
        }
    };

    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match async_runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let tenant = Tenant::new(name, generate_api_key(), plan);
    let result = runtime.block_on(async {
        let store = Store::open(&config.database).await.map_err(|error| match error {
            StoreError::Connect(_) => ("db_connectivity", error.to_string(), exit::DB_CONNECTIVITY),
            StoreError::Migrate(_) => ("migration", error.to_string(), exit::MIGRATION),
        })?;
        store
            .tenants
            .save(tenant.clone())
            .await
            .map_err(|error| ("seed_execution", error.to_string(), exit::SEED))
    });

    match result {
        Ok(()) => CommandResult::success(
            "seed",
            format!(
                "created tenant `{}` ({}) on plan {} with {} dialogs; api key: {}",
                tenant.name,
                tenant.id,
                tenant.plan.as_str(),
                tenant.dialogs_limit,
                tenant.api_key
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn generate_api_key() -> String {
    format!("{API_KEY_PREFIX}{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::{generate_api_key, run};

    #[test]
    fn api_keys_are_prefixed_and_unique() {
        let first = generate_api_key();
        let second = generate_api_key();

        assert!(first.starts_with("tl_"));
        assert_eq!(first.len(), 35);
        assert_ne!(first, second);
    }

    #[test]
    fn bad_arguments_fail_before_touching_storage() {
        let blank = run("   ", "pro");
        assert_eq!(blank.exit_code, 7);
        assert!(blank.output.contains("invalid_argument"));

        let unknown_plan = run("Sunny Travel", "gold");
        assert_eq!(unknown_plan.exit_code, 7);
        assert!(unknown_plan.output.contains("gold"));
    }
}

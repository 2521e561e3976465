use log::{error, info, warn};
use scheduling_config::{config, configure, MongoEnvironment};
use scheduling_database::{is_duplicate_resource, DatabaseInfo, ProvisionPlan};
use scheduling_result::{create_error, Result};

#[tokio::main]
async fn main() -> Result<()> {
    configure!(bootstrap);

    run().await.map_err(|err| {
        error!("Bootstrap failed: {err}");
        if is_duplicate_resource(&err) {
            warn!("The database looks provisioned already, set `SCHEDULING__BOOTSTRAP__ON_EXISTING=skip` to re-run safely.");
        }

        err
    })
}

async fn run() -> Result<()> {
    let settings = config().await.map_err(|error| {
        create_error!(InvalidConfiguration {
            error: error.to_string()
        })
    })?;

    let environment = MongoEnvironment::from_env().map_err(|error| {
        create_error!(InvalidConfiguration {
            error: error.to_string()
        })
    })?;

    let plan = ProvisionPlan::resolve(&settings, &environment)?;
    info!(
        "Bootstrapping `{}` with the {:?} profile.",
        plan.database, plan.profile
    );

    let db = DatabaseInfo::Auto.connect().await?;
    let target = plan.open(&db).await?;
    let report = plan.apply(&target).await?;

    info!(
        "Created {} collection(s) and ensured {} index(es), skipped {}.",
        report.collections.len(),
        report.indexes.len(),
        report.skipped.len()
    );

    if settings.bootstrap.verify {
        plan.verify(&target).await?;
    }

    Ok(())
}

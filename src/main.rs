use astra::Server;
use boardmap::config::{BackendConfig, DiscoveryConfig, ServerConfig};
use boardmap::db::{init_db, seed_demo, Database};
use boardmap::responses::error_to_response;
use boardmap::source::{BackendClient, ListingSource, SqliteSource};
use boardmap::telemetry::init_tracing;
use boardmap::{handle, AppContext};
use tracing::{error, info};

fn main() {
    init_tracing();
    let cfg = ServerConfig::from_env();

    // 1️⃣ Pick the listing source: the hosted backend when configured, the local database otherwise
    let source: Box<dyn ListingSource + Send + Sync> = match BackendConfig::from_env() {
        Some(backend) => match BackendClient::new(&backend) {
            Ok(client) => {
                info!(url = %backend.base_url, "using REST backend for listings");
                Box::new(client)
            }
            Err(e) => {
                error!(error = %e, "backend client setup failed");
                std::process::exit(1);
            }
        },
        None => {
            let db = Database::new(cfg.db_path.clone());
            if let Err(e) = init_db(&db).and_then(|_| seed_demo(&db)) {
                error!(error = %e, "database initialization failed");
                std::process::exit(1);
            }
            info!(path = %cfg.db_path, "using local database for listings");
            Box::new(SqliteSource::new(db))
        }
    };

    let ctx = AppContext::new(source, DiscoveryConfig::default());

    // 2️⃣ Start the server
    info!(addr = %cfg.addr, workers = cfg.workers, "starting server");
    let server = Server::bind(cfg.addr).max_workers(cfg.workers);

    let result = server.serve(move |req, _info| match handle(req, &ctx) {
        Ok(resp) => resp,
        Err(err) => error_to_response(err),
    });

    if let Err(e) = result {
        error!(error = %e, "server ended with error");
    }

    info!("server shut down cleanly");
}

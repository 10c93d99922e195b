use banter::app::App;
use banter::{config, ui};
use dotenv::dotenv;
use flexi_logger::{FileSpec, Logger};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    config::initialize_config()?;
    let config = config::get_config();

    // The terminal belongs to the TUI, so logs go to a file.
    let _logger = Logger::try_with_str(&config.log_level)?
        .log_to_file(FileSpec::default().basename("banter").suppress_timestamp())
        .start()?;
    log::info!("starting banter with model {}", config.model);

    let app = Arc::new(Mutex::new(App::new(config)));
    ui::run_ui(app).await
}

//! Command-line storefront: list, add and delete products and sales against
//! the first reachable API, falling back to sample data when none answers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};

use storefront_client::{
    CreateOutcome, DataSource, DeleteOutcome, EndpointSession, Resolution, ResourceView,
    SessionConfig,
};
use storefront_core::{EntityId, Resource};
use storefront_products::{ProductDraft, Products};
use storefront_sales::{PaymentMethod, SaleDraft, SaleStatus, Sales};

#[derive(Debug, Parser)]
#[command(name = "storefront", about = "Manage products and sales of the store")]
struct Cli {
    /// Candidate API base URL, tried in the order given (repeatable).
    #[arg(long = "api-url", global = true)]
    api_urls: Vec<String>,

    /// Per-probe timeout in milliseconds.
    #[arg(long, global = true)]
    probe_timeout_ms: Option<u64>,

    /// Start in offline mode (sample data, local-only writes).
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Test which API endpoint answers.
    Probe,
    #[command(subcommand)]
    Products(ProductsCommand),
    #[command(subcommand)]
    Sales(SalesCommand),
}

#[derive(Debug, Subcommand)]
enum ProductsCommand {
    List,
    Show { id: String },
    Add(AddProduct),
    Delete { id: String },
}

#[derive(Debug, Args)]
struct AddProduct {
    #[arg(long)]
    name: String,
    #[arg(long)]
    price: String,
    #[arg(long)]
    description: String,
    #[arg(long)]
    category: String,
    #[arg(long)]
    stock: String,
    #[arg(long, default_value = "")]
    image_url: String,
    /// Keep the product locally if the API cannot be reached.
    #[arg(long)]
    keep_local: bool,
}

#[derive(Debug, Subcommand)]
enum SalesCommand {
    List,
    Show { id: String },
    Add(AddSale),
    Delete { id: String },
}

#[derive(Debug, Args)]
struct AddSale {
    #[arg(long)]
    customer: String,
    /// Product to sell as `ID` or `ID:QUANTITY` (repeatable).
    #[arg(long = "product", required = true)]
    products: Vec<String>,
    #[arg(long, value_enum, default_value_t = Payment::Cash)]
    payment: Payment,
    #[arg(long, value_enum, default_value_t = Status::Pending)]
    status: Status,
    /// Keep the sale locally if the API cannot be reached.
    #[arg(long)]
    keep_local: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Payment {
    Cash,
    Card,
    Transfer,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Status {
    Pending,
    Completed,
    Cancelled,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    storefront_observability::init_pretty();

    let cli = Cli::parse();

    let mut config = SessionConfig::from_env()?;
    if !cli.api_urls.is_empty() {
        config = config.with_candidates(&cli.api_urls)?;
    }
    if let Some(ms) = cli.probe_timeout_ms {
        config = config.with_probe_timeout(Duration::from_millis(ms));
    }
    config.validate()?;

    let session = Arc::new(EndpointSession::http(config));
    if cli.offline {
        session.go_offline();
    }

    match cli.command {
        Command::Probe => {
            match session.test_connection().await {
                Resolution::Resolved(url) => println!("connected to {}", url),
                Resolution::Exhausted => println!("no API answered; offline mode active"),
                Resolution::Cancelled => println!("connection test cancelled"),
                Resolution::Superseded => println!("switched to offline mode during the test"),
            }
            Ok(())
        }
        Command::Products(cmd) => run_products(session, cmd).await,
        Command::Sales(cmd) => run_sales(session, cmd).await,
    }
}

async fn run_products(session: Arc<EndpointSession>, cmd: ProductsCommand) -> anyhow::Result<()> {
    let mut view = ResourceView::<Products>::new(session);

    match cmd {
        ProductsCommand::List => {
            let source = view.refresh().await.clone();
            print_source(&source);
            for p in view.items() {
                println!("{:>12}  {:<30} {:>10.2}  stock {}", p.id, p.name, p.price, p.stock);
            }
        }
        ProductsCommand::Show { id } => {
            view.refresh().await;
            let id = EntityId::from(id);
            let product = view.get(&id).with_context(|| format!("product {} not found", id))?;
            println!("{}", serde_json::to_string_pretty(product)?);
        }
        ProductsCommand::Add(args) => {
            let draft = ProductDraft {
                name: args.name,
                price: args.price,
                description: args.description,
                category: args.category,
                stock: args.stock,
                imageurl: args.image_url,
            };
            let outcome = view.create(&draft).await;
            report_create(&mut view, outcome, args.keep_local)?;
        }
        ProductsCommand::Delete { id } => {
            view.refresh().await;
            report_delete(view.delete(&EntityId::from(id)).await)?;
        }
    }
    Ok(())
}

async fn run_sales(session: Arc<EndpointSession>, cmd: SalesCommand) -> anyhow::Result<()> {
    let mut view = ResourceView::<Sales>::new(session.clone());

    match cmd {
        SalesCommand::List => {
            let source = view.refresh().await.clone();
            print_source(&source);
            for s in view.items() {
                println!(
                    "{:>12}  {:<24} {:>10.2}  {}",
                    s.id,
                    s.customer.as_deref().unwrap_or("-"),
                    s.total,
                    s.status.as_deref().unwrap_or("-"),
                );
            }
        }
        SalesCommand::Show { id } => {
            view.refresh().await;
            let id = EntityId::from(id);
            let sale = view.get(&id).with_context(|| format!("sale {} not found", id))?;
            println!("{}", serde_json::to_string_pretty(sale)?);
        }
        SalesCommand::Add(args) => {
            let mut catalogue = ResourceView::<Products>::new(session);
            catalogue.refresh().await;

            let mut draft = SaleDraft::new();
            draft.customer = args.customer;
            draft.payment_method = match args.payment {
                Payment::Cash => PaymentMethod::Cash,
                Payment::Card => PaymentMethod::Card,
                Payment::Transfer => PaymentMethod::Transfer,
            };
            draft.status = match args.status {
                Status::Pending => SaleStatus::Pending,
                Status::Completed => SaleStatus::Completed,
                Status::Cancelled => SaleStatus::Cancelled,
            };

            for entry in &args.products {
                let (id, quantity) = entry.split_once(':').unwrap_or((entry.as_str(), "1"));
                let id = EntityId::from(id);
                let product = catalogue
                    .get(&id)
                    .with_context(|| format!("product {} not found", id))?;
                draft.add_product(product)?;
                draft.set_quantity(&id, quantity)?;
            }
            println!("total: {:.2}", draft.total());

            let outcome = view.create(&draft).await;
            report_create(&mut view, outcome, args.keep_local)?;
        }
        SalesCommand::Delete { id } => {
            view.refresh().await;
            report_delete(view.delete(&EntityId::from(id)).await)?;
        }
    }
    Ok(())
}

fn print_source(source: &DataSource) {
    match source {
        DataSource::Remote { endpoint } => println!("# live data from {}", endpoint),
        DataSource::Offline => println!("# offline: showing sample data"),
        DataSource::Degraded(reason) => println!("# API unavailable ({}): showing sample data", reason),
    }
}

fn report_create<R: Resource>(
    view: &mut ResourceView<R>,
    outcome: CreateOutcome<R>,
    keep_local: bool,
) -> anyhow::Result<()> {
    match outcome {
        CreateOutcome::RemoteSuccess(entity) => {
            println!("created:\n{}", serde_json::to_string_pretty(&entity)?);
        }
        CreateOutcome::LocalOnlySuccess(entity) => {
            println!("saved locally only (offline):\n{}", serde_json::to_string_pretty(&entity)?);
        }
        CreateOutcome::ValidationFailure(errors) => bail!("please fix the following:\n{}", errors),
        CreateOutcome::ServerValidationFailure(errors) => {
            bail!("the server rejected the data:\n{}", errors)
        }
        CreateOutcome::RemoteFailure { reason, pending } => {
            if keep_local {
                println!("could not reach the API ({}); keeping it locally", reason);
                let kept = view.accept_local(pending);
                return report_create(view, kept, false);
            }
            pending.discard();
            bail!("could not save ({}); re-run with --keep-local to keep it on this device", reason);
        }
    }
    Ok(())
}

fn report_delete(outcome: DeleteOutcome) -> anyhow::Result<()> {
    match outcome {
        DeleteOutcome::Removed(persistence) => {
            println!("deleted ({:?})", persistence);
            Ok(())
        }
        DeleteOutcome::RemoteFailure(reason) => bail!("delete failed, nothing was removed: {}", reason),
        DeleteOutcome::NotFound => bail!("no such item"),
    }
}

use bankledger::application::engine::LedgerEngine;
use bankledger::domain::account::{AccountId, AccountType};
use bankledger::domain::ports::UserStore;
use bankledger::domain::transaction::Transaction;
use bankledger::domain::user::{User, UserId};
use bankledger::infrastructure::in_memory::{
    InMemoryAccountStore, InMemoryTransactionStore, InMemoryUserStore,
};
use bankledger::interfaces::csv::operation_reader::{OpKind, OperationReader, OperationRecord};
use bankledger::interfaces::csv::summary_writer::SummaryWriter;
use clap::Parser;
use miette::{IntoDiagnostic, Result, miette};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// Optional path to dump the produced transaction records as JSON
    #[arg(long)]
    journal: Option<PathBuf>,
}

/// Logs go to stderr so the stdout summary stays machine-readable.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bankledger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Drives the engine from a batch file, resolving user names and account
/// labels to the ids the engine works with.
struct BatchRunner {
    engine: LedgerEngine,
    users: InMemoryUserStore,
    user_ids: HashMap<String, UserId>,
    account_ids: BTreeMap<String, AccountId>,
    journal: Vec<Transaction>,
}

impl BatchRunner {
    fn new(engine: LedgerEngine, users: InMemoryUserStore) -> Self {
        Self {
            engine,
            users,
            user_ids: HashMap::new(),
            account_ids: BTreeMap::new(),
            journal: Vec::new(),
        }
    }

    async fn apply(&mut self, op: OperationRecord) -> Result<()> {
        match op.op {
            OpKind::Open => {
                let name = op.user.ok_or_else(|| miette!("open requires a user"))?;
                let label = op
                    .account
                    .ok_or_else(|| miette!("open requires an account label"))?;
                let currency = op
                    .currency
                    .ok_or_else(|| miette!("open requires a currency"))?;
                let initial = op.amount.unwrap_or(Decimal::ZERO);

                let owner = self.user_id_for(&name).await?;
                let account = self
                    .engine
                    .open_account(owner, AccountType::Checking, currency, initial)
                    .await
                    .into_diagnostic()?;
                self.account_ids.insert(label, account.id);
            }
            OpKind::Deposit | OpKind::Interest => {
                let account = self.account_for(op.account.as_deref())?;
                let amount = op.amount.ok_or_else(|| miette!("missing amount"))?;
                let description = op.description.unwrap_or_default();

                let tx = match op.op {
                    OpKind::Deposit => self.engine.deposit(account, amount, &description).await,
                    _ => {
                        self.engine
                            .apply_interest(account, amount, &description)
                            .await
                    }
                }
                .into_diagnostic()?;
                self.journal.push(tx);
            }
            OpKind::Withdraw | OpKind::Fee => {
                let account = self.account_for(op.account.as_deref())?;
                let amount = op.amount.ok_or_else(|| miette!("missing amount"))?;
                let description = op.description.unwrap_or_default();

                let tx = match op.op {
                    OpKind::Withdraw => self.engine.withdraw(account, amount, &description).await,
                    _ => self.engine.apply_fee(account, amount, &description).await,
                }
                .into_diagnostic()?;
                self.journal.push(tx);
            }
            OpKind::Transfer => {
                let source = self.account_for(op.account.as_deref())?;
                let destination = self.account_for(op.counterparty.as_deref())?;
                let amount = op.amount.ok_or_else(|| miette!("missing amount"))?;
                let description = op.description.unwrap_or_default();

                let (outgoing, incoming) = self
                    .engine
                    .transfer(source, destination, amount, &description)
                    .await
                    .into_diagnostic()?;
                self.journal.push(outgoing);
                self.journal.push(incoming);
            }
        }
        Ok(())
    }

    async fn user_id_for(&mut self, name: &str) -> Result<UserId> {
        if let Some(id) = self.user_ids.get(name) {
            return Ok(*id);
        }
        let user = User::new(name);
        let id = user.id;
        self.users.insert(user).await.into_diagnostic()?;
        self.user_ids.insert(name.to_string(), id);
        Ok(id)
    }

    fn account_for(&self, label: Option<&str>) -> Result<AccountId> {
        let label = label.ok_or_else(|| miette!("missing account label"))?;
        self.account_ids
            .get(label)
            .copied()
            .ok_or_else(|| miette!("unknown account label: {label}"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let users = InMemoryUserStore::new();
    let engine = LedgerEngine::new(
        Box::new(InMemoryAccountStore::new()),
        Box::new(InMemoryTransactionStore::new()),
        Box::new(users.clone()),
    );
    let mut runner = BatchRunner::new(engine, users);

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    for row in reader.operations() {
        match row {
            Ok(op) => {
                if let Err(e) = runner.apply(op).await {
                    eprintln!("Error processing operation: {e}");
                }
            }
            Err(e) => eprintln!("Error reading operation: {e}"),
        }
    }

    // Summary to stdout, ordered by account label.
    let mut rows = Vec::new();
    for (label, id) in &runner.account_ids {
        let account = runner.engine.account(*id).await.into_diagnostic()?;
        rows.push((label.clone(), account));
    }
    let stdout = io::stdout();
    let mut writer = SummaryWriter::new(stdout.lock());
    writer
        .write_accounts(rows.iter().map(|(label, account)| (label.as_str(), account)))
        .into_diagnostic()?;

    if let Some(path) = cli.journal {
        let json = serde_json::to_string_pretty(&runner.journal).into_diagnostic()?;
        std::fs::write(path, json).into_diagnostic()?;
    }

    Ok(())
}

use crate::domain::account::Account;
use std::io::Write;

/// Writes the final account summary as CSV.
pub struct SummaryWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> SummaryWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new().from_writer(sink),
        }
    }

    /// Writes one row per `(label, account)` pair, in the order given.
    pub fn write_accounts<'a, I>(&mut self, accounts: I) -> csv::Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a Account)>,
    {
        self.writer.write_record(["account", "currency", "balance"])?;
        for (label, account) in accounts {
            self.writer.write_record([
                label,
                &account.currency.to_string(),
                &account.balance.to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

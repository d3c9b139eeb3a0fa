//! Import command implementation.

use crate::cli::ImportArgs;
use crate::error::Result;
use crate::output::Formatter;
use folio_store::{CorpusFile, SqliteStore};
use std::path::Path;

/// Execute the import command.
pub fn execute_import(args: ImportArgs, formatter: &Formatter) -> Result<()> {
    let count = import_corpus(Path::new(&args.corpus), Path::new(&args.db))?;
    println!(
        "{}",
        formatter.success(&format!("Imported {} archive(s) into {}", count, args.db))
    );
    Ok(())
}

/// Copy a JSON corpus into a SQLite database, returning the archive count.
///
/// Archives already in the database are replaced.
pub fn import_corpus(corpus: &Path, db: &Path) -> Result<usize> {
    let corpus = CorpusFile::from_path(corpus)?;
    let mut store = SqliteStore::new(db)?;
    let count = corpus.import_into(&mut store)?;
    tracing::info!(archives = count, db = %db.display(), "Corpus imported");
    Ok(count)
}

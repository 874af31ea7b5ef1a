use std::{
    fs::File,
    io::{self, BufReader, BufWriter, StdoutLock, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context;
use chrono::{DateTime, Utc};
use rand::Rng as _;
use serde::Serialize;
use statbook_data::{RecordTable, SimulationSeed, io as table_io};

#[derive(Debug)]
pub enum Output {
    Stdout {
        writer: StdoutLock<'static>,
    },
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Output {
    pub fn save_json<T>(value: &T, output_path: Option<PathBuf>) -> anyhow::Result<()>
    where
        T: Serialize,
    {
        let mut output = Output::from_output_path(output_path)?;
        output.write_json(value)
    }

    pub fn save_table(table: &RecordTable, output_path: Option<PathBuf>) -> anyhow::Result<()> {
        let format = TableFormat::from_path(output_path.as_deref());
        let mut output = Output::from_output_path(output_path)?;
        output.write_table(table, format)
    }

    pub fn from_output_path(output_path: Option<PathBuf>) -> anyhow::Result<Self> {
        match output_path {
            Some(path) => Output::open(path),
            None => Ok(Output::stdout()),
        }
    }

    pub fn stdout() -> Self {
        Output::Stdout {
            writer: io::stdout().lock(),
        }
    }

    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Output::File {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn display_path(&self) -> String {
        match self {
            Output::Stdout { .. } => "stdout".to_string(),
            Output::File { path, .. } => path.display().to_string(),
        }
    }

    pub fn write_json<T>(&mut self, value: &T) -> anyhow::Result<()>
    where
        T: Serialize,
    {
        self.write_with("JSON", |out| {
            serde_json::to_writer_pretty(&mut *out, value)?;
            writeln!(out)?;
            Ok(())
        })
    }

    pub fn write_table(&mut self, table: &RecordTable, format: TableFormat) -> anyhow::Result<()> {
        self.write_with("table", |out| {
            match format {
                TableFormat::Csv => table_io::write_delimited(table, out, b',')?,
                TableFormat::Tsv => table_io::write_delimited(table, out, b'\t')?,
                TableFormat::Json => table_io::write_json(table, out)?,
            }
            Ok(())
        })
    }

    fn write_with<F>(&mut self, content: &str, write: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut Self) -> anyhow::Result<()>,
    {
        write(self)
            .with_context(|| format!("Failed to write {content} to {}", self.display_path()))?;
        self.flush()
            .with_context(|| format!("Failed to flush output to {}", self.display_path()))
    }
}

impl io::Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout { writer } => writer.write(buf),
            Output::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout { writer } => writer.flush(),
            Output::File { writer, .. } => writer.flush(),
        }
    }
}

/// On-disk table format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Tsv,
    Json,
}

impl TableFormat {
    /// CSV unless the extension says otherwise; stdout gets CSV.
    pub fn from_path(path: Option<&Path>) -> Self {
        match path
            .and_then(Path::extension)
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("tsv" | "tab") => Self::Tsv,
            Some("json") => Self::Json,
            _ => Self::Csv,
        }
    }
}

/// Loads a data file by extension; `categorical` names delimited columns
/// kept categorical even when every value is numeric.
pub fn read_table<P>(path: P, categorical: &[String]) -> anyhow::Result<RecordTable>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open data file: {}", path.display()))?;
    let reader = BufReader::new(file);
    let table = match TableFormat::from_path(Some(path)) {
        TableFormat::Csv => table_io::read_delimited_with(reader, b',', categorical),
        TableFormat::Tsv => table_io::read_delimited_with(reader, b'\t', categorical),
        TableFormat::Json => table_io::read_json(reader),
    }
    .with_context(|| format!("Failed to parse data file: {}", path.display()))?;
    log::info!(
        "loaded {} rows and {} columns from {}",
        table.len(),
        table.columns().len(),
        path.display()
    );
    Ok(table)
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {file_kind} file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {file_kind} JSON file: {}", path.display()))
}

/// The given seed, or a fresh one that is reported so the run can be repeated.
pub fn seed_or_random(seed: Option<SimulationSeed>) -> SimulationSeed {
    seed.unwrap_or_else(|| {
        let seed: SimulationSeed = rand::rng().random();
        eprintln!("Using seed {seed}");
        seed
    })
}

/// A saved report stamped with its creation time.
#[derive(Debug, Clone, Serialize)]
pub struct Report<T> {
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Report<T> {
    pub fn new(body: T) -> Self {
        Self {
            generated_at: Utc::now(),
            body,
        }
    }
}

/// Splits a comma-separated column list, dropping blanks.
pub fn split_columns(list: Option<&str>) -> Vec<String> {
    list.into_iter()
        .flat_map(|list| list.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_format_from_extension() {
        assert_eq!(TableFormat::from_path(None), TableFormat::Csv);
        assert_eq!(TableFormat::from_path(Some(Path::new("a.csv"))), TableFormat::Csv);
        assert_eq!(TableFormat::from_path(Some(Path::new("a.TSV"))), TableFormat::Tsv);
        assert_eq!(TableFormat::from_path(Some(Path::new("dir/a.json"))), TableFormat::Json);
        assert_eq!(TableFormat::from_path(Some(Path::new("noext"))), TableFormat::Csv);
    }

    #[test]
    fn test_output_writes_table_and_json() {
        let dir = std::env::temp_dir().join(format!("statbook-util-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let table = RecordTable::new(vec![
            statbook_data::Record::new(1).with_category("sex", "0"),
            statbook_data::Record::new(2).with_category("sex", "1"),
        ])
        .unwrap();

        let csv = dir.join("table.csv");
        Output::save_table(&table, Some(csv.clone())).unwrap();
        assert_eq!(std::fs::read_to_string(&csv).unwrap(), "idx,sex\n1,0\n2,1\n");
        let back = read_table(&csv, &["sex".to_owned()]).unwrap();
        assert_eq!(back, table);

        let json = dir.join("seed.json");
        Output::save_json(&SimulationSeed::from_u128(0xbeef), Some(json.clone())).unwrap();
        let seed: SimulationSeed = read_json_file("seed", &json).unwrap();
        assert_eq!(seed, SimulationSeed::from_u128(0xbeef));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_split_columns() {
        assert_eq!(split_columns(Some("age, sex,,")), ["age", "sex"]);
        assert!(split_columns(None).is_empty());
    }
}

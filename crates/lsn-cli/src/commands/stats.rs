use crate::cli::StatsArgs;
use crate::error::Result;
use crate::utils::parser::{parse_list, parse_usize};
use lsn::core::fit::{FitOptions, estimate_correlation_time};
use lsn::core::layout::float_label;
use lsn::core::stats::{autocorrelation, block_uncertainty};
use lsn::core::table::{ReadOptions, Table};
use lsn::engine::error::EngineError;
use lsn::exercises::molecular::block_size_scans;
use tracing::{info, warn};

/// Block uncertainty, block-size scan and correlation time of the columns of any CSV file.
pub async fn run(args: StatsArgs) -> Result<()> {
    let table = read(&args)?;
    info!(
        path = %args.file.display(),
        rows = table.n_rows(),
        columns = table.n_cols(),
        "Table loaded"
    );
    let lines = analyse(&table, &args)?;
    for line in &lines {
        println!("{}", line);
    }
    Ok(())
}

fn read(args: &StatsArgs) -> Result<Table> {
    let options = if args.headerless {
        ReadOptions::headerless()
    } else {
        ReadOptions::default()
    }
    .rows(args.skip_rows, None);
    let table = Table::read_csv_with(&args.file, options).map_err(EngineError::from)?;

    let Some(columns) = args.columns.as_deref() else {
        return Ok(table);
    };
    let names = parse_list(columns, |name| Ok(name.to_string()))?;
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    Ok(table.select(&names).map_err(EngineError::from)?)
}

/// One report line per column, plus the scan when requested.
fn analyse(table: &Table, args: &StatsArgs) -> Result<Vec<String>> {
    let mut lines = vec![format!(
        "{} rows, block size {}",
        table.n_rows(),
        args.block_size
    )];

    for (name, values) in table.columns() {
        let mean = values.iter().sum::<f64>() / values.len().max(1) as f64;
        let mut line = match block_uncertainty(values, args.block_size) {
            Ok(error) => format!("{:<12} {:.6} ± {:.2e}", name, mean, error),
            Err(e) => {
                warn!(column = name, "No block uncertainty: {}", e);
                format!("{:<12} {:.6}", name, mean)
            }
        };
        if args.n_lags > 0 {
            let time = autocorrelation(values, args.n_lags)
                .map_err(EngineError::from)
                .and_then(|acf| {
                    estimate_correlation_time(&acf, FitOptions::default())
                        .map_err(EngineError::from)
                });
            match time {
                Ok(time) => line.push_str(&format!(
                    "   τ = {} ± {}",
                    float_label(time.tau),
                    float_label(time.std_error())
                )),
                Err(e) => warn!(column = name, "No correlation time: {}", e),
            }
        }
        lines.push(line);
    }

    if let Some(scan) = args.scan.as_deref() {
        let sizes = parse_list(scan, parse_usize)?;
        let scans = block_size_scans(table, &sizes)?;
        match &args.output {
            Some(path) => {
                scans.write_csv(path).map_err(EngineError::from)?;
                lines.push(format!("Block-size scan written to: {}", path.display()));
            }
            None => {
                lines.push(scans.headers().join(","));
                lines.extend((0..scans.n_rows()).filter_map(|i| {
                    scans.row(i).map(|row| {
                        row.iter()
                            .map(|v| float_label(*v))
                            .collect::<Vec<_>>()
                            .join(",")
                    })
                }));
            }
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    fn args(file: PathBuf) -> StatsArgs {
        StatsArgs {
            file,
            columns: None,
            block_size: 10,
            scan: None,
            n_lags: 0,
            skip_rows: None,
            headerless: false,
            output: None,
        }
    }

    fn write_series(path: &Path) {
        let mut csv = String::from("step,U\n");
        for i in 0..200 {
            csv.push_str(&format!("{},{}\n", i, (i as f64 * 0.37).sin()));
        }
        fs::write(path, csv).unwrap();
    }

    #[test]
    fn selected_columns_are_reported_after_skipping() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("thermo.csv");
        write_series(&path);
        let mut args = args(path);
        args.columns = Some("U".to_string());
        args.skip_rows = Some(100);

        let table = read(&args).unwrap();
        assert_eq!(table.headers(), ["U"]);
        assert_eq!(table.n_rows(), 100);

        let lines = analyse(&table, &args).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("U"));
        assert!(lines[1].contains('±'));
    }

    #[test]
    fn unknown_column_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("thermo.csv");
        write_series(&path);
        let mut args = args(path);
        args.columns = Some("missing".to_string());

        assert!(read(&args).is_err());
    }

    #[test]
    fn scan_is_written_to_the_output_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("thermo.csv");
        write_series(&path);
        let mut args = args(path);
        args.scan = Some("1,10,50,500".to_string());
        args.output = Some(dir.path().join("scan.csv"));
        args.n_lags = 20;

        let table = read(&args).unwrap();
        let lines = analyse(&table, &args).unwrap();

        let scan = Table::read_csv(&dir.path().join("scan.csv")).unwrap();
        // 500 leaves a single block and is dropped.
        assert_eq!(scan.column("block_size").unwrap(), [1.0, 10.0, 50.0]);
        assert!(lines.last().unwrap().contains("scan.csv"));
    }

    #[test]
    fn headerless_files_get_numbered_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.dat");
        fs::write(&path, "1,2\n3,4\n5,6\n7,8\n").unwrap();
        let mut args = args(path);
        args.headerless = true;
        args.block_size = 2;

        let table = read(&args).unwrap();
        assert_eq!(table.headers(), ["0", "1"]);
        assert_eq!(analyse(&table, &args).unwrap().len(), 3);
    }
}

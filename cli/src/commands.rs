//! Subcommand implementations, generic over the backing [Storage].

use geoseis_codec::{Endian, SampleFormat, TextEncoding};
use geoseis_geometry::Point;
use geoseis_runtime::Storage;
use geoseis_storage::{
    Container, CreationPolicy, Dataset, ExportConfig, ImportConfig, ObjectKind, Param,
};
use std::{fmt::Write as _, ops::ControlFlow, path::Path};
use thiserror::Error;
use tracing::{debug, info};

pub const IMPORT_CMD: &str = "import";
pub const EXPORT_CMD: &str = "export";
pub const INFO_CMD: &str = "info";
pub const BOUNDARY_CMD: &str = "boundary";
pub const INDEX_CMD: &str = "index";
pub const LIST_CMD: &str = "list";

/// Traces decoded per worker task.
pub const DEFAULT_BUFFER: &str = "4096";

pub const FORMATS: [&str; 5] = ["ibm", "int4", "int2", "ieee", "int1"];
pub const ENDIANS: [&str; 2] = ["big", "little"];
pub const ENCODINGS: [&str; 2] = ["ebcdic", "ascii"];

#[derive(Debug, Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] geoseis_storage::Error),
    #[error("invalid {0}: {1}")]
    InvalidArgument(&'static str, String),
}

pub fn parse_format(value: &str) -> Result<SampleFormat, Error> {
    match value {
        "ibm" => Ok(SampleFormat::Ibm),
        "int4" => Ok(SampleFormat::Int4),
        "int2" => Ok(SampleFormat::Int2),
        "ieee" => Ok(SampleFormat::Ieee),
        "int1" => Ok(SampleFormat::Int1),
        other => Err(Error::InvalidArgument("format", other.to_string())),
    }
}

pub fn parse_endian(value: &str) -> Result<Endian, Error> {
    match value {
        "big" => Ok(Endian::Big),
        "little" => Ok(Endian::Little),
        other => Err(Error::InvalidArgument("endian", other.to_string())),
    }
}

pub fn parse_encoding(value: &str) -> Result<TextEncoding, Error> {
    match value {
        "ebcdic" => Ok(TextEncoding::Ebcdic),
        "ascii" => Ok(TextEncoding::Ascii),
        other => Err(Error::InvalidArgument("encoding", other.to_string())),
    }
}

/// Open `name`, creating an empty container if there is none.
fn open_or_create<S: Storage>(storage: S, name: &str) -> Result<Container<S>, Error> {
    match Container::open(storage.clone(), name) {
        Err(geoseis_storage::Error::ObjectMissing(_)) => Ok(Container::create(storage, name)?),
        other => Ok(other?),
    }
}

fn open_dataset<S: Storage>(storage: S, container: &str, name: &str) -> Result<Dataset<S>, Error> {
    let container = Container::open(storage, container)?;
    Ok(container.open_seismic(name)?)
}

/// Log progress at every whole ten percent.
fn log_progress(fraction: f64) -> ControlFlow<()> {
    let percent = (fraction * 100.0).floor();
    if percent % 10.0 == 0.0 {
        debug!(percent, "progress");
    }
    ControlFlow::Continue(())
}

/// Import `file` into dataset `name`, creating the container and dataset if needed.
///
/// Returns the trace count after the import.
pub fn import<S: Storage>(
    storage: S,
    container: &str,
    name: &str,
    file: &Path,
    cfg: &ImportConfig,
) -> Result<usize, Error> {
    let mut container = open_or_create(storage, container)?;
    let policy = if cfg.append {
        CreationPolicy::Open
    } else {
        CreationPolicy::OpenOrCreate
    };
    let mut dataset = container.create_seismic(name, Param::default(), policy)?;
    dataset.import_segy(file, cfg, Some(&log_progress))?;
    dataset.finalize()?;
    info!(
        dataset = name,
        traces = dataset.trace_count(),
        samples = dataset.sample_count(),
        "import complete"
    );
    Ok(dataset.trace_count())
}

/// Export dataset `name` to `file`.
pub fn export<S: Storage>(
    storage: S,
    container: &str,
    name: &str,
    file: &Path,
    cfg: &ExportConfig,
) -> Result<(), Error> {
    let dataset = open_dataset(storage, container, name)?;
    dataset.export_segy(file, cfg, Some(&log_progress))?;
    Ok(())
}

/// Describe dataset `name`.
pub fn info<S: Storage>(storage: S, container: &str, name: &str) -> Result<String, Error> {
    let dataset = open_dataset(storage, container, name)?;
    let mut out = String::new();
    let _ = writeln!(out, "name: {}", dataset.name());
    let _ = writeln!(out, "traces: {}", dataset.trace_count());
    let _ = writeln!(out, "samples: {}", dataset.sample_count());
    let _ = writeln!(
        out,
        "sample rate: {} {}",
        dataset.sample_rate("")?,
        dataset.sample_units()
    );
    let _ = writeln!(out, "domain: {}", dataset.domain());
    let _ = writeln!(out, "data type: {}", dataset.data_type());
    let _ = writeln!(out, "survey type: {}", dataset.survey_type());
    let _ = writeln!(out, "length units: {}", dataset.length_units());
    for key in dataset.pkey_names() {
        let size = dataset.pkey_size(key)?;
        match dataset.limits(key, "")? {
            Some((min, max)) => {
                let _ = writeln!(out, "key {key}: {size} values in [{min}, {max}]");
            }
            None => {
                let _ = writeln!(out, "key {key}: {size} values");
            }
        }
    }
    Ok(out)
}

/// Stored boundary of dataset `name`, in `units`.
pub fn boundary<S: Storage>(
    storage: S,
    container: &str,
    name: &str,
    units: &str,
) -> Result<Vec<Point>, Error> {
    let dataset = open_dataset(storage, container, name)?;
    Ok(dataset.boundary(units, None)?)
}

/// Traces of dataset `name` whose `key` lies in `[min, max]`.
pub fn query<S: Storage>(
    storage: S,
    container: &str,
    name: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<Vec<usize>, Error> {
    let dataset = open_dataset(storage, container, name)?;
    Ok(dataset.pkey_indexes(key, min, max)?)
}

/// Seismic datasets in the container.
pub fn list<S: Storage>(storage: S, container: &str) -> Result<Vec<String>, Error> {
    let container = Container::open(storage, container)?;
    Ok(container.names(ObjectKind::Seismic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoseis_codec::{fields, BinaryHeader, Layout, TextHeader, Writer};
    use geoseis_macros::test_traced;
    use geoseis_runtime::storage::memory;
    use tempfile::TempDir;

    fn write_file(path: &Path) {
        let layout = Layout {
            endian: Endian::Big,
            format: SampleFormat::Ibm,
            encoding: TextEncoding::Ebcdic,
            samples: 3,
            traces: 4,
        };
        let writer = Writer::create(path, layout).unwrap();
        writer.write_text_header(&TextHeader::default()).unwrap();
        let mut bin = BinaryHeader::default();
        bin.values[fields::BIN_SAMP_RATE] = 4.0;
        writer.write_bin_header(&bin).unwrap();
        let cdp = fields::trace_index("CDP").unwrap();
        let x = fields::trace_index("CDP_X").unwrap();
        let y = fields::trace_index("CDP_Y").unwrap();
        let mut headers = vec![0.0; 4 * fields::TRACE_FIELD_COUNT];
        for (t, row) in headers.chunks_exact_mut(fields::TRACE_FIELD_COUNT).enumerate() {
            row[cdp] = (t / 2 + 1) as f64;
            row[x] = (t % 2) as f64 * 100.0;
            row[y] = (t / 2) as f64 * 100.0;
        }
        let samples: Vec<f32> = (0..12).map(|i| i as f32).collect();
        writer.write_traces(0, &headers, &samples).unwrap();
        writer.sync().unwrap();
    }

    #[test_traced]
    fn test_import_then_inspect() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("line.sgy");
        write_file(&file);
        let storage = memory::Storage::default();

        let traces = import(storage.clone(), "project", "line", &file, &ImportConfig::default())
            .unwrap();
        assert_eq!(traces, 4);
        let appended = ImportConfig {
            append: true,
            ..Default::default()
        };
        assert_eq!(
            import(storage.clone(), "project", "line", &file, &appended).unwrap(),
            8
        );
        assert_eq!(list(storage.clone(), "project").unwrap(), vec!["line"]);

        let report = info(storage.clone(), "project", "line").unwrap();
        assert!(report.contains("traces: 8"));
        assert!(report.contains("samples: 3"));
        assert!(report.contains("key CDP_X: 2 values in [0, 100]"));

        assert_eq!(
            query(storage.clone(), "project", "line", "CDP_Y", 100.0, 100.0).unwrap(),
            vec![2, 3, 6, 7]
        );
        assert_eq!(
            boundary(storage.clone(), "project", "line", "km")
                .unwrap()
                .len(),
            4
        );

        let out = dir.path().join("out.sgy");
        let cfg = ExportConfig {
            format: parse_format("int4").unwrap(),
            endian: parse_endian("little").unwrap(),
            encoding: parse_encoding("ascii").unwrap(),
            ..Default::default()
        };
        export(storage, "project", "line", &out, &cfg).unwrap();
        let reader = geoseis_codec::Reader::open(&out).unwrap();
        assert_eq!(reader.layout().traces, 8);
        assert_eq!(reader.layout().format, SampleFormat::Int4);
    }

    #[test_traced]
    fn test_missing_objects() {
        let storage = memory::Storage::default();
        assert!(matches!(
            info(storage.clone(), "project", "line"),
            Err(Error::Storage(geoseis_storage::Error::ObjectMissing(_)))
        ));
        Container::create(storage.clone(), "project").unwrap();
        assert!(matches!(
            query(storage, "project", "line", "CDP", 0.0, 1.0),
            Err(Error::Storage(geoseis_storage::Error::ObjectMissing(_)))
        ));
        assert!(matches!(
            parse_format("float"),
            Err(Error::InvalidArgument("format", _))
        ));
    }
}

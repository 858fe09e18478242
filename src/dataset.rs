use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failures while reading the patient source. Never surfaced to query callers.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("dataset file not found: {0}")]
    Missing(PathBuf),
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed dataset: {0}")]
    Csv(#[from] csv::Error),
}

/// One normalized row of the patient dataset.
///
/// Text fields are trimmed; an empty string means the cell was absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientRecord {
    /// 1-based position in the source file.
    pub id: u32,
    pub birth_year: Option<f64>,
    pub age: Option<f64>,
    pub gender: String,
    pub admission_date: String,
    /// Centimetres.
    pub height: Option<f64>,
    /// Kilograms.
    pub weight: Option<f64>,
    pub bmi: Option<f64>,
    pub medical_history: String,
    pub previous_surgery: String,
    pub stone_type: String,
    pub stone_size: String,
    pub num_stones: Option<f64>,
    pub hu: Option<f64>,
    pub surgery_date: String,
    pub surgery_position: String,
    pub surgery_time_minutes: Option<f64>,
    pub surgery_result: String,
    pub residual_stones: String,
    pub complications: String,
    pub hb: Option<f64>,
    pub plt: Option<f64>,
    pub creatinin: Option<f64>,
    pub egfr: Option<f64>,
}

/// The in-memory patient collection, built once and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Display name of the source, usually the file name.
    pub source: String,
    /// Number of columns in the source header.
    pub columns: usize,
    pub records: Vec<PatientRecord>,
}

/// A source column with its two spellings. The canonical one carries the
/// trailing whitespace found in the exported sheet.
struct Column {
    canonical: &'static str,
    alternate: &'static str,
}

const fn col(canonical: &'static str, alternate: &'static str) -> Column {
    Column { canonical, alternate }
}

const BIRTH_YEAR: Column = col("Năm sinh ", "Năm sinh");
const GENDER: Column = col("Giới tính", "Giới tính ");
const ADMISSION_DATE: Column = col("Ngày nhập viện ", "Ngày nhập viện");
const HEIGHT: Column = col("Chiều cao", "Chiều cao ");
const WEIGHT: Column = col("Cân nặng ", "Cân nặng");
const BMI: Column = col("BMI", "BMI ");
const MEDICAL_HISTORY: Column = col("Tiền căn nội khoa ", "Tiền căn nội khoa");
const PREVIOUS_SURGERY: Column = col("Tiền căn đã mổ sỏi thận ", "Tiền căn đã mổ sỏi thận");
const STONE_TYPE: Column = col("Loại sỏi ", "Loại sỏi");
const STONE_SIZE: Column = col(
    "Kích thước sỏi 3 chiều (khối lớn nhất) ",
    "Kích thước sỏi 3 chiều (khối lớn nhất)",
);
const NUM_STONES: Column = col("Số lượng sỏi ", "Số lượng sỏi");
const HU: Column = col("HU", "HU ");
const SURGERY_DATE: Column = col("Ngày PT", "Ngày PT ");
const SURGERY_POSITION: Column = col("Tư thế", "Tư thế ");
const SURGERY_TIME: Column = col("Thời gian phẫu thuật (phút)", "Thời gian phẫu thuật (phút) ");
const SURGERY_RESULT: Column = col(
    "Sạch sỏi trên C-arm ngay sau mổ ",
    "Sạch sỏi trên C-arm ngay sau mổ",
);
const RESIDUAL_STONES: Column = col(
    "Nếu sót sỏi trên C-arm ngay sau mổ (số lượng/vị trí/kích thước) ",
    "Nếu sót sỏi trên C-arm ngay sau mổ (số lượng/vị trí/kích thước)",
);
const COMPLICATIONS: Column = col("Biến chứng ", "Biến chứng");
const HB: Column = col("Hb (g/dL)", "Hb (g/dL) ");
const PLT: Column = col("PLT (K/uL)", "PLT (K/uL) ");
const CREATININ: Column = col("Creatinin ", "Creatinin");
const EGFR: Column = col("eGFR", "eGFR ");

/// Header name to position lookup.
struct HeaderIndex(HashMap<String, usize>);

impl HeaderIndex {
    fn new(headers: &csv::StringRecord) -> Self {
        let mut map = HashMap::new();
        for (i, name) in headers.iter().enumerate() {
            // First occurrence wins for duplicated headers
            map.entry(name.trim_start_matches('\u{feff}').to_string())
                .or_insert(i);
        }
        Self(map)
    }

    /// The alternate spelling is only consulted when the canonical column
    /// does not exist at all; an empty canonical cell stays empty.
    fn position(&self, column: &Column) -> Option<usize> {
        self.0
            .get(column.canonical)
            .or_else(|| self.0.get(column.alternate))
            .copied()
    }

    fn text(&self, row: &csv::StringRecord, column: &Column) -> String {
        self.position(column)
            .and_then(|i| row.get(i))
            .map(|cell| cell.trim().to_string())
            .unwrap_or_default()
    }

    fn number(&self, row: &csv::StringRecord, column: &Column) -> Option<f64> {
        self.position(column)
            .and_then(|i| row.get(i))
            .and_then(parse_number)
    }
}

/// Best-effort numeric conversion of a raw cell.
///
/// Accepts a decimal comma, returns `None` for empty, NaN-like or otherwise
/// unparseable input.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Round to one decimal place.
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// weight / (height in metres)², `None` without a usable height.
pub fn body_mass_index(height_cm: f64, weight_kg: f64) -> Option<f64> {
    if height_cm <= 0.0 {
        return None;
    }
    let height_m = height_cm / 100.0;
    Some(weight_kg / (height_m * height_m))
}

impl PatientRecord {
    fn from_row(id: u32, row: &csv::StringRecord, index: &HeaderIndex, reference_year: i32) -> Self {
        let birth_year = index.number(row, &BIRTH_YEAR);
        let height = index.number(row, &HEIGHT);
        let weight = index.number(row, &WEIGHT);

        let mut record = Self {
            id,
            birth_year,
            age: birth_year.map(|year| f64::from(reference_year) - year),
            gender: index.text(row, &GENDER),
            admission_date: index.text(row, &ADMISSION_DATE),
            height,
            weight,
            bmi: index.number(row, &BMI),
            medical_history: index.text(row, &MEDICAL_HISTORY),
            previous_surgery: index.text(row, &PREVIOUS_SURGERY),
            stone_type: index.text(row, &STONE_TYPE),
            stone_size: index.text(row, &STONE_SIZE),
            num_stones: index.number(row, &NUM_STONES),
            hu: index.number(row, &HU),
            surgery_date: index.text(row, &SURGERY_DATE),
            surgery_position: index.text(row, &SURGERY_POSITION),
            surgery_time_minutes: index.number(row, &SURGERY_TIME),
            surgery_result: index.text(row, &SURGERY_RESULT),
            residual_stones: index.text(row, &RESIDUAL_STONES),
            complications: index.text(row, &COMPLICATIONS),
            hb: index.number(row, &HB),
            plt: index.number(row, &PLT),
            creatinin: index.number(row, &CREATININ),
            egfr: index.number(row, &EGFR),
        };

        if record.bmi.is_none() {
            if let (Some(h), Some(w)) = (height, weight) {
                record.bmi = body_mass_index(h, w).map(round1);
            }
        }

        record
    }
}

impl Dataset {
    /// Build a dataset from any CSV byte stream with a header row.
    pub fn from_reader<R: Read>(
        source: impl Into<String>,
        reader: R,
        reference_year: i32,
    ) -> Result<Self, LoadError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let index = HeaderIndex::new(&headers);

        let mut records = Vec::new();
        for row in csv_reader.records() {
            let row = row?;
            let id = records.len() as u32 + 1;
            records.push(PatientRecord::from_row(id, &row, &index, reference_year));
        }

        Ok(Self {
            source: source.into(),
            columns: headers.len(),
            records,
        })
    }

    /// Read the dataset file at `path`.
    pub fn read<P: AsRef<Path>>(path: P, reference_year: i32) -> Result<Self, LoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoadError::Missing(path.to_path_buf()));
        }

        let file = std::fs::File::open(path)?;
        let source = path
            .file_name()
            .unwrap_or(path.as_os_str())
            .to_string_lossy()
            .to_string();

        Self::from_reader(source, file, reference_year)
    }

    /// Load the dataset, degrading to an empty one on any failure.
    pub fn load<P: AsRef<Path>>(path: P, reference_year: i32) -> Self {
        let path = path.as_ref();
        match Self::read(path, reference_year) {
            Ok(dataset) => {
                log::info!(
                    "Dataset: loaded {} patients from {}",
                    dataset.len(),
                    dataset.source
                );
                dataset
            }
            Err(LoadError::Missing(missing)) => {
                log::warn!("Dataset: file not found: {}", missing.display());
                Self::empty(path)
            }
            Err(e) => {
                log::warn!("Dataset: failed to read {}: {}", path.display(), e);
                Self::empty(path)
            }
        }
    }

    fn empty(path: &Path) -> Self {
        Self {
            source: path.display().to_string(),
            columns: 0,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&PatientRecord> {
        self.records.iter().find(|p| p.id == id)
    }

    pub fn ids(&self) -> Vec<u32> {
        self.records.iter().map(|p| p.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Năm sinh ,Giới tính,Chiều cao,Cân nặng ,BMI,Loại sỏi ,Thời gian phẫu thuật (phút),Sạch sỏi trên C-arm ngay sau mổ ,Biến chứng ,Hb (g/dL)
1980,Nam,170,\"72,5\",,Sỏi san hô,90,Có,,\"13,2\"
1975, Nữ ,160,55,\"21,4\",Sỏi bể thận,abc,Sót,Sốt,
,Nam,,80,,,,,,nan
";

    fn sample() -> Dataset {
        Dataset::from_reader("sample.csv", SAMPLE.as_bytes(), 2025).unwrap()
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("12"), Some(12.0));
        assert_eq!(parse_number("12,5"), Some(12.5));
        assert_eq!(parse_number(" 3.25 "), Some(3.25));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("   "), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("nan"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("không"), None);
    }

    #[test]
    fn test_ids_are_dense_in_file_order() {
        let dataset = sample();
        assert_eq!(dataset.ids(), vec![1, 2, 3]);
        assert_eq!(dataset.columns, 10);
        assert_eq!(dataset.source, "sample.csv");
    }

    #[test]
    fn test_row_normalization() {
        let dataset = sample();
        let first = &dataset.records[0];
        assert_eq!(first.age, Some(45.0));
        assert_eq!(first.gender, "Nam");
        assert_eq!(first.weight, Some(72.5));
        assert_eq!(first.hb, Some(13.2));
        assert_eq!(first.surgery_time_minutes, Some(90.0));
        assert_eq!(first.complications, "");

        let second = &dataset.records[1];
        assert_eq!(second.gender, "Nữ");
        assert_eq!(second.surgery_time_minutes, None);
        assert_eq!(second.complications, "Sốt");

        let third = &dataset.records[2];
        assert_eq!(third.birth_year, None);
        assert_eq!(third.age, None);
        assert_eq!(third.hb, None);
    }

    #[test]
    fn test_bmi_derived_only_when_absent() {
        let dataset = sample();
        // 72.5 / 1.7² = 25.086...
        assert_eq!(dataset.records[0].bmi, Some(25.1));
        assert_eq!(dataset.records[1].bmi, Some(21.4));
        assert_eq!(dataset.records[2].bmi, None);
    }

    #[test]
    fn test_canonical_column_preferred_over_alternate() {
        let csv = "Năm sinh ,Năm sinh,Giới tính\n1990,1950,Nam\n,1950,Nữ\n";
        let dataset = Dataset::from_reader("dup.csv", csv.as_bytes(), 2025).unwrap();
        assert_eq!(dataset.records[0].age, Some(35.0));
        // Canonical column exists, so its empty cell wins.
        assert_eq!(dataset.records[1].age, None);
    }

    #[test]
    fn test_alternate_column_used_when_canonical_missing() {
        let csv = "Năm sinh,Giới tính,Loại sỏi\n2000,Nam,Sỏi niệu quản\n";
        let dataset = Dataset::from_reader("alt.csv", csv.as_bytes(), 2025).unwrap();
        assert_eq!(dataset.records[0].age, Some(25.0));
        assert_eq!(dataset.records[0].stone_type, "Sỏi niệu quản");
    }

    #[test]
    fn test_load_missing_file_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::load(dir.path().join("OK-2.csv"), 2025);
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("OK-2.csv");
        std::fs::write(&path, SAMPLE).unwrap();

        let dataset = Dataset::load(&path, 2025);
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.source, "OK-2.csv");
        assert_eq!(dataset.get(2).map(|p| p.gender.as_str()), Some("Nữ"));
        assert!(dataset.get(4).is_none());
    }

    #[test]
    fn test_load_unreadable_file_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("OK-2.csv");
        std::fs::write(&path, b"Gi\xff\xfei,BMI\nNam,20\n").unwrap();

        let dataset = Dataset::load(&path, 2025);
        assert!(dataset.is_empty());
    }
}

use std::io::Write;

use polars::prelude::*;
use tempfile::NamedTempFile;
use tracing::info;

use super::error::Result;

/// One row of the built-in fixture dataset.
#[derive(Debug, Clone, Copy)]
pub struct FixtureHospital {
    pub name: &'static str,
    pub address: &'static str,
    pub departments: &'static str,
    pub phone: &'static str,
    pub url: &'static str,
    pub emergency: &'static str,
    pub lat: f64,
    pub lon: f64,
    /// Hours for 월, 화, 수, 목, 금, 토, 일, 공휴일 (empty = closed)
    pub hours: [&'static str; 8],
}

const WEEKDAY: &str = "09:00-18:00";

/// Hospitals in Seoul with approximately correct coordinates.
pub const FIXTURE_HOSPITALS: &[FixtureHospital] = &[
    FixtureHospital {
        name: "서울대학교병원",
        address: "서울특별시 종로구 대학로 101",
        departments: "내과,외과,응급의학과",
        phone: "02-2072-2114",
        url: "http://www.snuh.org",
        emergency: "Y",
        lat: 37.5796,
        lon: 126.9990,
        hours: [WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, "09:00-13:00", "", ""],
    },
    FixtureHospital {
        name: "삼성서울병원",
        address: "서울특별시 강남구 일원로 81",
        departments: "내과/소아청소년과/응급의학과",
        phone: "02-3410-2114",
        url: "http://www.samsunghospital.com",
        emergency: "응급실 운영",
        lat: 37.4881,
        lon: 127.0856,
        hours: [WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, "09:00-13:00", "", ""],
    },
    FixtureHospital {
        name: "강남연세내과의원",
        address: "서울특별시 강남구 테헤란로 123",
        departments: "내과",
        phone: "02-555-1234",
        url: "",
        emergency: "N",
        lat: 37.5006,
        lon: 127.0364,
        hours: [WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, "", "", ""],
    },
    FixtureHospital {
        name: "종로정형외과의원",
        address: "서울특별시 종로구 종로 200",
        departments: "정형외과",
        phone: "02-765-4321",
        url: "",
        emergency: "",
        lat: 37.5705,
        lon: 127.0016,
        hours: [WEEKDAY, WEEKDAY, "", WEEKDAY, WEEKDAY, "10:00-14:00", "", ""],
    },
    FixtureHospital {
        name: "마포소아청소년과의원",
        address: "서울특별시 마포구 월드컵로 10",
        departments: "소아청소년과",
        phone: "02-333-1111",
        url: "",
        emergency: "0",
        lat: 37.5559,
        lon: 126.9105,
        hours: [WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, "10:00-13:00", ""],
    },
    FixtureHospital {
        name: "서울아산병원",
        address: "서울특별시 송파구 올림픽로43길 88",
        departments: "내과,외과,응급의학과",
        phone: "1688-7575",
        url: "http://www.amc.seoul.kr",
        emergency: "1",
        lat: 37.5266,
        lon: 127.1081,
        hours: [WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, "09:00-13:00", "", "24시간 응급"],
    },
    FixtureHospital {
        name: "송파치과의원",
        address: "서울특별시 송파구 송파대로 300",
        departments: "치과",
        phone: "02-400-2828",
        url: "",
        emergency: "N",
        lat: 37.5045,
        lon: 127.1120,
        hours: [WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, "", "", ""],
    },
    FixtureHospital {
        name: "노원안과의원",
        address: "서울특별시 노원구 상계로 5",
        departments: "안과",
        phone: "02-930-0000",
        url: "",
        emergency: "N",
        lat: 37.6548,
        lon: 127.0617,
        hours: [WEEKDAY, "", WEEKDAY, "", WEEKDAY, "", "", ""],
    },
    FixtureHospital {
        name: "영등포피부과의원",
        address: "서울특별시 영등포구 영중로 15",
        departments: "피부과",
        phone: "02-2670-0000",
        url: "",
        emergency: "N",
        lat: 37.5170,
        lon: 126.9070,
        hours: [WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, "", "", ""],
    },
    FixtureHospital {
        name: "은평한의원",
        address: "서울특별시 은평구 통일로 850",
        departments: "한방내과",
        phone: "02-388-0000",
        url: "",
        emergency: "N",
        lat: 37.6027,
        lon: 126.9291,
        hours: [WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, "", "", ""],
    },
    FixtureHospital {
        name: "신촌세브란스병원",
        address: "서울특별시 서대문구 연세로 50-1",
        departments: "내과,신경과,응급의학과",
        phone: "1599-1004",
        url: "http://sev.severance.healthcare",
        emergency: "Emergency Center",
        lat: 37.5622,
        lon: 126.9407,
        hours: [WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, "09:00-13:00", "", ""],
    },
    FixtureHospital {
        name: "강남세브란스병원",
        address: "서울특별시 강남구 언주로 211",
        departments: "내과,정형외과",
        phone: "1599-6114",
        url: "",
        emergency: "Y",
        lat: 37.4926,
        lon: 127.0462,
        hours: [WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, WEEKDAY, "", "", ""],
    },
];

/// Rows that must be rejected at load time: bad, missing and out-of-range coordinates.
const INVALID_ROWS: [(&str, &str, &str); 3] = [
    ("좌표없음의원", "N/A", "127.0"),
    ("경도없음의원", "37.5", ""),
    ("범위밖의원", "123.0", "127.0"),
];

/// Which header naming convention the generated CSV uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStyle {
    /// `병원명`, `주소`, `위도`, `경도`, `월` ... as published by Korean open-data portals
    Korean,
    /// `name`, `address`, `lat`, `lon`, `mon` ...
    English,
}

impl HeaderStyle {
    fn headers(self) -> [&'static str; 16] {
        match self {
            Self::Korean => [
                "병원명", "주소", "진료과목", "전화번호", "URL", "응급실", "위도", "경도", "월",
                "화", "수", "목", "금", "토", "일", "공휴일",
            ],
            Self::English => [
                "name",
                "address",
                "department",
                "phone",
                "url",
                "emergency",
                "lat",
                "lon",
                "mon",
                "tue",
                "wed",
                "thu",
                "fri",
                "sat",
                "sun",
                "holiday",
            ],
        }
    }
}

/// Configuration for test data generation
#[derive(Debug, Clone)]
pub struct TestDataConfig {
    /// Number of valid hospital rows to write
    pub rows: usize,
    /// Append rows with unusable coordinates
    pub include_invalid_rows: bool,
    pub header_style: HeaderStyle,
}

impl Default for TestDataConfig {
    fn default() -> Self {
        Self {
            rows: FIXTURE_HOSPITALS.len(),
            include_invalid_rows: false,
            header_style: HeaderStyle::Korean,
        }
    }
}

impl TestDataConfig {
    /// Minimal data for unit tests
    pub fn minimal() -> Self {
        Self {
            rows: 3,
            include_invalid_rows: false,
            header_style: HeaderStyle::Korean,
        }
    }

    /// Sample data for integration tests
    pub fn sample() -> Self {
        Self {
            rows: FIXTURE_HOSPITALS.len(),
            include_invalid_rows: true,
            header_style: HeaderStyle::Korean,
        }
    }

    pub fn with_header_style(mut self, style: HeaderStyle) -> Self {
        self.header_style = style;
        self
    }

    /// Number of rows written that a loader must drop.
    pub fn invalid_row_count(&self) -> usize {
        if self.include_invalid_rows {
            INVALID_ROWS.len()
        } else {
            0
        }
    }
}

fn fixture_row(index: usize) -> FixtureHospital {
    if let Some(hospital) = FIXTURE_HOSPITALS.get(index) {
        return *hospital;
    }
    // Past the fixture list, shift a copy of an existing row so names stay unique.
    let base = FIXTURE_HOSPITALS[index % FIXTURE_HOSPITALS.len()];
    let step = (index / FIXTURE_HOSPITALS.len()) as f64;
    FixtureHospital {
        name: "테스트의원",
        lat: base.lat + 0.001 * step,
        lon: base.lon - 0.001 * step,
        ..base
    }
}

/// Write string rows under `headers` as CSV; blank cells become empty fields.
fn render_csv(headers: &[&str], rows: &[Vec<String>]) -> Result<String> {
    let columns = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let values: Vec<Option<&str>> = rows
                .iter()
                .map(|row| row.get(i).map(String::as_str).filter(|v| !v.is_empty()))
                .collect();
            Column::new((*header).into(), values)
        })
        .collect();
    let mut df = DataFrame::new(columns)?;

    let mut buffer = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .finish(&mut df)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Render the configured dataset as CSV text.
pub fn test_data_csv(config: &TestDataConfig) -> Result<String> {
    let mut rows = Vec::with_capacity(config.rows + INVALID_ROWS.len());

    for index in 0..config.rows {
        let h = fixture_row(index);
        let name = if index < FIXTURE_HOSPITALS.len() {
            h.name.to_string()
        } else {
            format!("{} {index}", h.name)
        };
        let mut fields = vec![
            name,
            h.address.to_string(),
            h.departments.to_string(),
            h.phone.to_string(),
            h.url.to_string(),
            h.emergency.to_string(),
            h.lat.to_string(),
            h.lon.to_string(),
        ];
        fields.extend(h.hours.iter().map(ToString::to_string));
        rows.push(fields);
    }

    if config.include_invalid_rows {
        for (name, lat, lon) in INVALID_ROWS {
            let mut fields: Vec<String> = [name, "서울특별시", "내과", "", "", "Y", lat, lon]
                .into_iter()
                .map(str::to_string)
                .collect();
            fields.extend(std::iter::repeat_n(String::new(), 8));
            rows.push(fields);
        }
    }

    render_csv(&config.header_style.headers(), &rows)
}

/// Create test data in a temporary file
pub fn create_test_data(config: &TestDataConfig) -> Result<NamedTempFile> {
    info!("Creating test data with config: {:?}", config);

    let mut file = tempfile::Builder::new().suffix(".csv").tempfile()?;
    file.write_all(test_data_csv(config)?.as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{load_csv, read_csv_bytes};

    #[test]
    fn test_minimal_csv_shape() {
        let csv = test_data_csv(&TestDataConfig::minimal()).unwrap();
        let table = read_csv_bytes(csv.as_bytes()).unwrap();

        assert_eq!(table.height(), 3);
        assert_eq!(table.width(), 16);
        assert_eq!(table.headers()[0], "병원명");
        // Quoted multi-department cell survives intact
        assert_eq!(table.cell(0, 2), Some("내과,외과,응급의학과"));
    }

    #[test]
    fn test_sample_includes_invalid_rows() {
        let config = TestDataConfig::sample();
        let table = read_csv_bytes(test_data_csv(&config).unwrap().as_bytes()).unwrap();
        assert_eq!(
            table.height(),
            FIXTURE_HOSPITALS.len() + config.invalid_row_count()
        );
    }

    #[test]
    fn test_synthetic_rows_beyond_fixtures() {
        let config = TestDataConfig {
            rows: FIXTURE_HOSPITALS.len() + 5,
            ..TestDataConfig::default()
        };
        let table = read_csv_bytes(test_data_csv(&config).unwrap().as_bytes()).unwrap();
        assert_eq!(table.height(), FIXTURE_HOSPITALS.len() + 5);
        let last = table.cell(table.height() - 1, 0).unwrap();
        assert!(last.starts_with("테스트의원"));
    }

    #[test]
    fn test_english_headers() {
        let config = TestDataConfig::minimal().with_header_style(HeaderStyle::English);
        let file = create_test_data(&config).unwrap();
        let loaded = load_csv(file.path()).unwrap();
        assert_eq!(loaded.table.headers()[6], "lat");
        assert_eq!(loaded.metadata.rows, 3);
    }

    #[test]
    fn test_rendered_cells_are_escaped() {
        let rows = vec![
            vec!["A \"Central\" 의원".to_string(), "1층, 2층".to_string()],
            vec!["B의원".to_string(), String::new()],
        ];
        let csv = render_csv(&["name", "note"], &rows).unwrap();
        let table = read_csv_bytes(csv.as_bytes()).unwrap();

        assert_eq!(table.height(), 2);
        assert_eq!(table.cell(0, 0), Some("A \"Central\" 의원"));
        assert_eq!(table.cell(0, 1), Some("1층, 2층"));
        assert_eq!(table.cell(1, 1), None);
    }
}

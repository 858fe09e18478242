use lazy_static::lazy_static;
use regex::Regex;

use crate::dataset::Dataset;
use crate::report;

/// Report a query is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Overview,
    Gender,
    StoneType,
    PatientDetail,
    Surgery,
    Bmi,
    Fallback,
}

type Handler = fn(&str, &Dataset) -> String;

struct Route {
    category: Category,
    keywords: &'static [&'static str],
    handler: Handler,
}

impl Route {
    /// An empty keyword set matches every query.
    fn matches(&self, query_lower: &str) -> bool {
        self.keywords.is_empty() || self.keywords.iter().any(|k| query_lower.contains(k))
    }
}

/// Evaluated in order; the first match wins.
const ROUTES: &[Route] = &[
    Route {
        category: Category::Overview,
        keywords: &["tổng quan", "overview", "thống kê", "tong quan"],
        handler: report::overview,
    },
    Route {
        category: Category::Gender,
        keywords: &["giới tính", "gender", "nam nữ", "gioi tinh"],
        handler: report::gender,
    },
    Route {
        category: Category::StoneType,
        keywords: &["sỏi", "stone", "loại sỏi", "soi"],
        handler: report::stone_types,
    },
    Route {
        category: Category::PatientDetail,
        keywords: &["bệnh nhân", "patient", "id", "benh nhan"],
        handler: report::patient_detail,
    },
    Route {
        category: Category::Surgery,
        keywords: &["phẫu thuật", "pt", "surgery", "phau thuat"],
        handler: report::surgery,
    },
    Route {
        category: Category::Bmi,
        keywords: &["bmi", "cân nặng", "béo phì", "can nang"],
        handler: report::bmi,
    },
    Route {
        category: Category::Fallback,
        keywords: &[],
        handler: report::help,
    },
];

lazy_static! {
    static ref PATIENT_ID: Regex = Regex::new(r"\b(\d+)\b").unwrap();
}

fn route(query: &str) -> &'static Route {
    let query_lower = query.to_lowercase();
    ROUTES
        .iter()
        .find(|r| r.matches(&query_lower))
        .unwrap_or(&ROUTES[ROUTES.len() - 1])
}

pub fn classify(query: &str) -> Category {
    route(query).category
}

/// First standalone integer in the query, as written, e.g. `7` in
/// "bệnh nhân ID 7". Later integers are never considered.
pub fn find_patient_id(query: &str) -> Option<&str> {
    PATIENT_ID
        .captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Answer a free-text query against the dataset. Never fails.
pub fn answer(query: &str, dataset: &Dataset) -> String {
    log::info!("YTE tool call: yte(query='{}')", query);

    if dataset.is_empty() {
        return report::NO_DATA.to_string();
    }

    let route = route(query);
    log::debug!("Router: '{}' -> {:?}", query, route.category);
    (route.handler)(query, dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::nine_patients;

    #[test]
    fn test_classify_each_category() {
        assert_eq!(classify("Tổng quan bệnh nhân"), Category::Overview);
        assert_eq!(classify("phân tích giới tính"), Category::Gender);
        assert_eq!(classify("loại sỏi phổ biến"), Category::StoneType);
        assert_eq!(classify("bệnh nhân ID 1"), Category::PatientDetail);
        assert_eq!(classify("kết quả phẫu thuật"), Category::Surgery);
        assert_eq!(classify("BMI"), Category::Bmi);
        assert_eq!(classify("thời tiết hôm nay"), Category::Fallback);
    }

    #[test]
    fn test_first_matching_category_wins() {
        // Mentions both patients and stones; stones are checked first.
        assert_eq!(classify("bệnh nhân có sỏi"), Category::StoneType);
        assert_eq!(classify("overview of gender"), Category::Overview);
        // "pt" is a substring of "except".
        assert_eq!(classify("everything except bmi"), Category::Surgery);
    }

    #[test]
    fn test_find_patient_id() {
        assert_eq!(find_patient_id("bệnh nhân ID 7"), Some("7"));
        assert_eq!(find_patient_id("patient 12 and 3"), Some("12"));
        assert_eq!(find_patient_id("patient 99999999999 or 3"), Some("99999999999"));
        assert_eq!(find_patient_id("patient7"), None);
        assert_eq!(find_patient_id("danh sách bệnh nhân"), None);
    }

    #[test]
    fn test_empty_dataset_short_circuits() {
        let empty = Dataset::default();
        for query in ["tổng quan", "giới tính", "sỏi", "bệnh nhân 1", "phẫu thuật", "bmi", "xyz"] {
            assert_eq!(answer(query, &empty), report::NO_DATA);
        }
    }

    #[test]
    fn test_answer_patient_seven() {
        let report = answer("bệnh nhân 7", &nine_patients());
        assert!(report.contains("ID 7"));
        assert!(report.contains("CHI TIẾT BỆNH NHÂN"));
    }

    #[test]
    fn test_answer_unknown_first_id_is_not_found() {
        let dataset = nine_patients();

        let report = answer("patient 99999999999 or 3", &dataset);
        assert!(report.starts_with("❌ Không tìm thấy bệnh nhân ID 99999999999"));
        assert!(report.contains("[1, 2, 3, 4, 5, 6, 7, 8, 9]"));
        assert!(!report.contains("CHI TIẾT"));

        let report = answer("bệnh nhân 99999999999", &dataset);
        assert!(report.starts_with("❌ Không tìm thấy bệnh nhân ID 99999999999"));

        let report = answer("bệnh nhân ٧", &dataset);
        assert!(report.starts_with("❌ Không tìm thấy bệnh nhân ID ٧"));
    }

    #[test]
    fn test_answer_is_idempotent() {
        let dataset = nine_patients();
        for query in ["tổng quan", "giới tính", "bệnh nhân", "phẫu thuật", "hello"] {
            assert_eq!(answer(query, &dataset), answer(query, &dataset));
        }
    }
}

use crate::dataset::{body_mass_index, Dataset, PatientRecord};
use crate::router::find_patient_id;

pub const MALE: &str = "Nam";
pub const FEMALE: &str = "Nữ";
/// Outcome substring for a stone-free result.
pub const CLEAR_MARKER: &str = "Có";
/// Outcome substring for residual stones.
pub const RESIDUAL_MARKER: &str = "Sót";
pub const UNDETERMINED: &str = "Không xác định";

pub const NO_DATA: &str = "❌ Không có dữ liệu y tế để phân tích";
pub const INSUFFICIENT_BMI_DATA: &str = "❌ Không có đủ dữ liệu chiều cao/cân nặng để tính BMI";

/// Percentage of `part` in `whole`, 0 when `whole` is 0.
fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(values.iter().fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))))
}

/// Raw field rendering: floats keep their fractional part (`43.0`).
fn value(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{:?}", v),
        None => "N/A".to_string(),
    }
}

fn text_or<'a>(text: &'a str, fallback: &'a str) -> &'a str {
    if text.is_empty() {
        fallback
    } else {
        text
    }
}

/// Male:female ratio, `n:0` when there are no women.
fn gender_ratio(male: usize, female: usize) -> String {
    if female > 0 {
        format!("{:.1}:1", male as f64 / female as f64)
    } else {
        format!("{}:0", male)
    }
}

/// Count labels in first-seen order.
fn tally<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<(&'a str, usize)> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for label in labels {
        match counts.iter_mut().find(|(l, _)| *l == label) {
            Some((_, n)) => *n += 1,
            None => counts.push((label, 1)),
        }
    }
    counts
}

fn known_ages<'a>(patients: impl Iterator<Item = &'a PatientRecord>) -> Vec<f64> {
    patients.filter_map(|p| p.age).collect()
}

pub fn overview(_query: &str, dataset: &Dataset) -> String {
    let records = &dataset.records;
    let total = records.len();

    let male_count = records.iter().filter(|p| p.gender == MALE).count();
    let female_count = records.iter().filter(|p| p.gender == FEMALE).count();

    let ages = known_ages(records.iter());
    let avg_age = mean(&ages).unwrap_or(0.0);

    let clear = records
        .iter()
        .filter(|p| p.surgery_result.contains(CLEAR_MARKER))
        .count();
    let residual = records
        .iter()
        .filter(|p| p.surgery_result.contains(RESIDUAL_MARKER))
        .count();

    let mut result = format!(
        "🏥 THỐNG KÊ TỔNG QUAN Y TẾ (Dữ liệu {source})\n\n\
         📊 TỔNG SỐ BỆNH NHÂN: {total}\n\n\
         👫 PHÂN BỐ GIỚI TÍNH:\n\
         ▪️ Nam: {male_count} bệnh nhân ({male_pct:.1}%)\n\
         ▪️ Nữ: {female_count} bệnh nhân ({female_pct:.1}%)\n\
         ▪️ Tỷ lệ Nam/Nữ: {ratio}\n\n\
         📈 THÔNG TIN TUỔI:\n\
         ▪️ Tuổi trung bình: {avg_age:.1} tuổi",
        source = dataset.source,
        male_pct = pct(male_count, total),
        female_pct = pct(female_count, total),
        ratio = gender_ratio(male_count, female_count),
    );

    if let Some((youngest, oldest)) = min_max(&ages) {
        result.push_str(&format!(
            "\n▪️ Tuổi thấp nhất: {} tuổi\n▪️ Tuổi cao nhất: {} tuổi",
            value(Some(youngest)),
            value(Some(oldest)),
        ));
    }

    result.push_str(&format!(
        "\n\n🎯 KẾT QUẢ PHẪU THUẬT PCNL:\n\
         ▪️ Sạch sỏi: {clear} ca ({clear_pct:.1}%)\n\
         ▪️ Sót sỏi: {residual} ca ({residual_pct:.1}%)\n\n\
         📅 Dữ liệu: {source} - {total} bệnh nhân sỏi thận PCNL",
        clear_pct = pct(clear, total),
        residual_pct = pct(residual, total),
        source = dataset.source,
    ));

    result
}

pub fn gender(_query: &str, dataset: &Dataset) -> String {
    let total = dataset.len();
    let males: Vec<&PatientRecord> = dataset.records.iter().filter(|p| p.gender == MALE).collect();
    let females: Vec<&PatientRecord> = dataset.records.iter().filter(|p| p.gender == FEMALE).collect();

    let male_avg = mean(&known_ages(males.iter().copied())).unwrap_or(0.0);
    let female_avg = mean(&known_ages(females.iter().copied())).unwrap_or(0.0);

    let male_ids: Vec<u32> = males.iter().map(|p| p.id).collect();
    let female_ids: Vec<u32> = females.iter().map(|p| p.id).collect();

    format!(
        "👫 PHÂN TÍCH GIỚI TÍNH (Dữ liệu {source})\n\n\
         👨 NAM GIỚI: {male_count} bệnh nhân\n\
         ▪️ Tuổi trung bình: {male_avg:.1} tuổi\n\
         ▪️ ID bệnh nhân: {male_ids:?}\n\
         ▪️ Chiếm tỷ lệ: {male_pct:.1}%\n\n\
         👩 NỮ GIỚI: {female_count} bệnh nhân\n\
         ▪️ Tuổi trung bình: {female_avg:.1} tuổi\n\
         ▪️ ID bệnh nhân: {female_ids:?}\n\
         ▪️ Chiếm tỷ lệ: {female_pct:.1}%\n\n\
         📊 SO SÁNH:\n\
         ▪️ Tỷ lệ Nam/Nữ: {ratio}\n\
         ▪️ Chênh lệch tuổi TB: {gap:.1} tuổi",
        source = dataset.source,
        male_count = males.len(),
        female_count = females.len(),
        male_pct = pct(males.len(), total),
        female_pct = pct(females.len(), total),
        ratio = gender_ratio(males.len(), females.len()),
        gap = (male_avg - female_avg).abs(),
    )
}

pub fn stone_types(_query: &str, dataset: &Dataset) -> String {
    let total = dataset.len();
    let mut counts = tally(
        dataset
            .records
            .iter()
            .map(|p| p.stone_type.as_str())
            .filter(|t| !t.is_empty() && *t != UNDETERMINED),
    );
    // Stable: ties keep first-seen order.
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let mut result = format!(
        "🪨 PHÂN TÍCH LOẠI SỎI (Dữ liệu {})\n\n📊 PHÂN LOẠI SỎI THẬN:",
        dataset.source
    );

    for (label, count) in &counts {
        result.push_str(&format!(
            "\n▪️ {}: {} ca ({:.1}%)",
            label,
            count,
            pct(*count, total)
        ));
    }

    let (top_label, top_count) = counts.first().copied().unwrap_or(("N/A", 0));

    result.push_str(&format!(
        "\n\n📈 THỐNG KÊ SỎI:\n\
         ▪️ Tổng số loại: {kinds} loại khác nhau\n\
         ▪️ Phổ biến nhất: {top_label} ({top_count} ca)\n\
         ▪️ Đa dạng: {diversity:.1}% tỷ lệ đa dạng loại sỏi",
        kinds = counts.len(),
        diversity = pct(counts.len(), total),
    ));

    result
}

pub fn patient_detail(query: &str, dataset: &Dataset) -> String {
    let Some(literal) = find_patient_id(query) else {
        return patient_list(dataset);
    };

    // Out-of-range or non-ASCII digits cannot name a record.
    let found = literal.parse::<u32>().ok().and_then(|id| dataset.get(id));
    match found {
        Some(patient) => patient_card(patient, &dataset.source),
        None => format!(
            "❌ Không tìm thấy bệnh nhân ID {}\n📋 ID có sẵn: {:?}",
            literal,
            dataset.ids()
        ),
    }
}

fn patient_card(p: &PatientRecord, source: &str) -> String {
    format!(
        "👤 CHI TIẾT BỆNH NHÂN ID {id} ({source})\n\n\
         🏷️ THÔNG TIN CÁ NHÂN:\n\
         ▪️ Tuổi: {age} tuổi ({birth_year})\n\
         ▪️ Giới tính: {gender}\n\
         ▪️ Ngày nhập viện: {admission}\n\
         ▪️ Chiều cao: {height} cm\n\
         ▪️ Cân nặng: {weight} kg\n\
         ▪️ BMI: {bmi}\n\n\
         🏥 TIỀN CĂN BỆNH LÝ:\n\
         ▪️ Bệnh lý nội khoa: {history}\n\
         ▪️ Tiền sử PT sỏi: {previous}\n\n\
         🪨 THÔNG TIN SỎI:\n\
         ▪️ Loại sỏi: {stone_type}\n\
         ▪️ Kích thước: {stone_size}\n\
         ▪️ Mật độ HU: {hu}\n\
         ▪️ Số lượng: {num_stones}\n\n\
         ⚕️ PHẪU THUẬT PCNL:\n\
         ▪️ Ngày PT: {surgery_date}\n\
         ▪️ Tư thế: {position}\n\
         ▪️ Thời gian PT: {duration} phút\n\
         ▪️ Kết quả: {outcome}\n\
         ▪️ Sỏi còn lại: {residual}\n\
         ▪️ Biến chứng: {complications}\n\n\
         🔬 XÉT NGHIỆM:\n\
         ▪️ Hb: {hb} g/dL\n\
         ▪️ PLT: {plt} K/uL\n\
         ▪️ Creatinin: {creatinin} μmol/L\n\
         ▪️ eGFR: {egfr} mL/min",
        id = p.id,
        age = value(p.age),
        birth_year = value(p.birth_year),
        gender = text_or(&p.gender, "N/A"),
        admission = text_or(&p.admission_date, "N/A"),
        height = value(p.height),
        weight = value(p.weight),
        bmi = value(p.bmi),
        history = text_or(&p.medical_history, "Không có"),
        previous = text_or(&p.previous_surgery, "Chưa mổ"),
        stone_type = text_or(&p.stone_type, "N/A"),
        stone_size = text_or(&p.stone_size, "N/A"),
        hu = value(p.hu),
        num_stones = value(p.num_stones),
        surgery_date = text_or(&p.surgery_date, "N/A"),
        position = text_or(&p.surgery_position, "N/A"),
        duration = value(p.surgery_time_minutes),
        outcome = text_or(&p.surgery_result, "N/A"),
        residual = text_or(&p.residual_stones, "Không"),
        complications = text_or(&p.complications, "Không"),
        hb = value(p.hb),
        plt = value(p.plt),
        creatinin = value(p.creatinin),
        egfr = value(p.egfr),
    )
}

fn patient_list(dataset: &Dataset) -> String {
    let mut result = format!(
        "👥 DANH SÁCH BỆNH NHÂN ({})\n\n📋 {} BỆNH NHÂN SỎI THẬN PCNL:",
        dataset.source,
        dataset.len()
    );

    for p in &dataset.records {
        result.push_str(&format!(
            "\n▪️ ID {}: {} {} tuổi - {}",
            p.id,
            text_or(&p.gender, "N/A"),
            value(p.age),
            text_or(&p.stone_type, "N/A"),
        ));
    }

    result
}

pub fn surgery(_query: &str, dataset: &Dataset) -> String {
    let total = dataset.len();
    let outcomes = tally(
        dataset
            .records
            .iter()
            .map(|p| text_or(&p.surgery_result, UNDETERMINED)),
    );
    let durations: Vec<f64> = dataset
        .records
        .iter()
        .filter_map(|p| p.surgery_time_minutes)
        .filter(|&minutes| minutes != 0.0)
        .collect();
    let with_complications = dataset
        .records
        .iter()
        .filter(|p| !p.complications.is_empty())
        .count();
    let without_complications = total - with_complications;

    let mut result = format!(
        "⚕️ PHÂN TÍCH PHẪU THUẬT PCNL ({})\n\n🎯 KẾT QUẢ PHẪU THUẬT:",
        dataset.source
    );

    for (outcome, count) in &outcomes {
        result.push_str(&format!(
            "\n▪️ {}: {} ca ({:.1}%)",
            outcome,
            count,
            pct(*count, total)
        ));
    }

    let range = min_max(&durations);
    result.push_str(&format!(
        "\n\n⏱️ THỜI GIAN PHẪU THUẬT:\n\
         ▪️ Thời gian TB: {avg:.1} phút\n\
         ▪️ Thời gian ngắn nhất: {shortest} phút\n\
         ▪️ Thời gian dài nhất: {longest} phút\n\n\
         🚨 BIẾN CHỨNG:\n\
         ▪️ Có biến chứng: {with_complications} ca\n\
         ▪️ Không biến chứng: {without_complications} ca\n\
         ▪️ Tỷ lệ an toàn: {safety:.1}%",
        avg = mean(&durations).unwrap_or(0.0),
        shortest = value(range.map(|(lo, _)| lo)),
        longest = value(range.map(|(_, hi)| hi)),
        safety = pct(without_complications, total),
    ));

    result
}

/// WHO body-mass-index band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BmiBand {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl BmiBand {
    pub fn classify(bmi: f64) -> Self {
        if bmi < 18.5 {
            BmiBand::Underweight
        } else if bmi < 25.0 {
            BmiBand::Normal
        } else if bmi < 30.0 {
            BmiBand::Overweight
        } else {
            BmiBand::Obese
        }
    }

    fn label(self) -> &'static str {
        match self {
            BmiBand::Underweight => "Thiếu cân",
            BmiBand::Normal => "Bình thường",
            BmiBand::Overweight => "Thừa cân",
            BmiBand::Obese => "Béo phì",
        }
    }
}

/// BMI recomputed from height and weight for every record carrying both.
pub fn recomputed_bmis(dataset: &Dataset) -> Vec<(f64, f64, f64)> {
    dataset
        .records
        .iter()
        .filter_map(|p| {
            let (height, weight) = (p.height?, p.weight?);
            if weight == 0.0 {
                return None;
            }
            body_mass_index(height, weight).map(|bmi| (bmi, height, weight))
        })
        .collect()
}

pub fn bmi(_query: &str, dataset: &Dataset) -> String {
    let measured = recomputed_bmis(dataset);
    if measured.is_empty() {
        return INSUFFICIENT_BMI_DATA.to_string();
    }

    let n = measured.len();
    let bmis: Vec<f64> = measured.iter().map(|m| m.0).collect();
    let heights: Vec<f64> = measured.iter().map(|m| m.1).collect();
    let weights: Vec<f64> = measured.iter().map(|m| m.2).collect();

    let count = |band: BmiBand| bmis.iter().filter(|&&b| BmiBand::classify(b) == band).count();
    let underweight = count(BmiBand::Underweight);
    let normal = count(BmiBand::Normal);
    let overweight = count(BmiBand::Overweight);
    let obese = count(BmiBand::Obese);

    let largest = underweight.max(normal).max(overweight).max(obese);
    let dominant = [
        (BmiBand::Normal, normal),
        (BmiBand::Overweight, overweight),
        (BmiBand::Obese, obese),
        (BmiBand::Underweight, underweight),
    ]
    .into_iter()
    .find(|(_, c)| *c == largest)
    .map(|(band, _)| band)
    .unwrap_or(BmiBand::Underweight);

    format!(
        "⚖️ PHÂN TÍCH BMI VÀ CÂN NẶNG ({source})\n\n\
         📊 THỐNG KÊ CHUNG:\n\
         ▪️ BMI trung bình: {avg_bmi:.1}\n\
         ▪️ Chiều cao TB: {avg_height:.1} cm\n\
         ▪️ Cân nặng TB: {avg_weight:.1} kg\n\n\
         📈 PHÂN LOẠI BMI (WHO):\n\
         ▪️ Thiếu cân (<18.5): {underweight} ca ({under_pct:.1}%)\n\
         ▪️ Bình thường (18.5-24.9): {normal} ca ({normal_pct:.1}%)\n\
         ▪️ Thừa cân (25-29.9): {overweight} ca ({over_pct:.1}%)\n\
         ▪️ Béo phì (≥30): {obese} ca ({obese_pct:.1}%)\n\n\
         💡 NHẬN XÉT:\n\
         ▪️ Phần lớn bệnh nhân có BMI: {dominant}\n\
         ▪️ Tỷ lệ thừa cân + béo phì: {heavy_pct:.1}%",
        source = dataset.source,
        avg_bmi = mean(&bmis).unwrap_or(0.0),
        avg_height = mean(&heights).unwrap_or(0.0),
        avg_weight = mean(&weights).unwrap_or(0.0),
        under_pct = pct(underweight, n),
        normal_pct = pct(normal, n),
        over_pct = pct(overweight, n),
        obese_pct = pct(obese, n),
        dominant = dominant.label(),
        heavy_pct = pct(overweight + obese, n),
    )
}

pub fn help(query: &str, dataset: &Dataset) -> String {
    format!(
        "🔍 TÌM KIẾM Y TẾ: \"{query}\"\n\n\
         📊 DỮ LIỆU CÓ SẴN ({source}):\n\
         ▪️ {total} bệnh nhân sỏi thận PCNL\n\
         ▪️ {columns} cột dữ liệu chi tiết\n\
         ▪️ Thông tin phẫu thuật đầy đủ\n\n\
         💡 CÁC LOẠI PHÂN TÍCH:\n\
         ▪️ \"tổng quan\" - Thống kê tổng quát\n\
         ▪️ \"giới tính\" - Phân bố nam/nữ\n\
         ▪️ \"sỏi\" - Phân tích loại sỏi\n\
         ▪️ \"bệnh nhân [ID]\" - Chi tiết bệnh nhân\n\
         ▪️ \"phẫu thuật\" - Kết quả PT PCNL\n\
         ▪️ \"bmi\" - Phân tích cân nặng\n\n\
         🏥 VÍ DỤ TRUY VẤN:\n\
         ▪️ yte(\"tổng quan bệnh nhân\")\n\
         ▪️ yte(\"phân tích giới tính\")\n\
         ▪️ yte(\"bệnh nhân ID 1\")\n\
         ▪️ yte(\"loại sỏi phổ biến\")",
        source = dataset.source,
        total = dataset.len(),
        columns = dataset.columns,
    )
}

/// Static description of the tool and the loaded dataset.
pub fn info(dataset: &Dataset) -> String {
    format!(
        "🏥 YTE TOOL - PHÂN TÍCH Y TẾ\n\n\
         📊 DỮ LIỆU:\n\
         ▪️ Nguồn: {source}\n\
         ▪️ Số bệnh nhân: {total}\n\
         ▪️ Loại bệnh: Sỏi thận PCNL\n\
         ▪️ Cột dữ liệu: {columns} cột\n\n\
         🔧 CHỨC NĂNG:\n\
         ▪️ Thống kê tổng quan\n\
         ▪️ Phân tích giới tính & tuổi\n\
         ▪️ Phân loại sỏi thận\n\
         ▪️ Chi tiết bệnh nhân\n\
         ▪️ Kết quả phẫu thuật\n\
         ▪️ Phân tích BMI\n\n\
         🎯 CÁCH SỬ DỤNG:\n\
         yte(\"câu hỏi phân tích y tế\")\n\n\
         💡 Tool chuyên biệt cho phân tích dữ liệu y tế từ {source}",
        source = dataset.source,
        total = dataset.len(),
        columns = dataset.columns,
    )
}

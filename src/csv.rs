//! CSV export (rosters, access codes, activity reports) and roster import.
//!
//! Exports use fixed Arabic headers and a UTF-8 BOM so spreadsheet tools pick
//! the right encoding. Import reads the 5-column template with a plain comma
//! split: quoted fields are not supported.

use chrono::{DateTime, Utc};

use crate::access_codes::code_status;
use crate::domain::{AccessCode, CodeStatus, NewStudent, Student, StudentActivity};

const BOM: &str = "\u{feff}";

pub const STUDENT_HEADERS: &[&str] = &[
  "الاسم", "رقم الطالب", "الصف", "البريد الإلكتروني لولي الأمر", "النقاط", "السلسلة", "الكلمات المتعلمة", "آخر نشاط",
];

pub const ACCESS_CODE_HEADERS: &[&str] = &[
  "الرمز", "الصف", "الوصف", "تاريخ الانتهاء", "عدد الاستخدامات", "الحد الأقصى", "الحالة", "تاريخ الإنشاء",
];

pub const REPORT_HEADERS: &[&str] = &[
  "الطالب", "النشاط", "العنوان", "النتيجة", "الوقت المستغرق (دقائق)", "الكلمات", "التاريخ",
];

pub const IMPORT_HEADERS: &[&str] = &["الاسم", "رقم الطالب", "الصف", "البريد الإلكتروني لولي الأمر", "ملاحظات"];

/// Quote a field when it would otherwise break the row.
fn field(s: &str) -> String {
  if s.contains([',', '"', '\n', '\r']) {
    format!("\"{}\"", s.replace('"', "\"\""))
  } else {
    s.to_string()
  }
}

fn date(t: Option<DateTime<Utc>>) -> String {
  t.map(|t| t.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

fn render(headers: &[&str], rows: impl Iterator<Item = Vec<String>>) -> String {
  let mut out = String::from(BOM);
  out.push_str(&headers.join(","));
  out.push('\n');
  for row in rows {
    let line: Vec<String> = row.iter().map(|f| field(f)).collect();
    out.push_str(&line.join(","));
    out.push('\n');
  }
  out
}

pub fn export_students(students: &[Student]) -> String {
  render(
    STUDENT_HEADERS,
    students.iter().map(|s| {
      vec![
        s.name.clone(),
        s.student_number.clone(),
        s.grade.to_string(),
        s.parent_email.clone(),
        s.progress.score.to_string(),
        s.progress.streak.to_string(),
        s.progress.words_learned.to_string(),
        date(s.last_active),
      ]
    }),
  )
}

fn status_label(status: CodeStatus) -> &'static str {
  match status {
    CodeStatus::Active => "نشط",
    CodeStatus::Inactive => "معطل",
    CodeStatus::Expired => "منتهي",
    CodeStatus::Exhausted => "مستنفد",
  }
}

pub fn export_access_codes(codes: &[AccessCode], now: DateTime<Utc>) -> String {
  render(
    ACCESS_CODE_HEADERS,
    codes.iter().map(|c| {
      vec![
        c.code.clone(),
        c.grade.to_string(),
        c.description.clone(),
        date(c.expires_at),
        c.usage_count.to_string(),
        c.max_usage.map(|m| m.to_string()).unwrap_or_else(|| "غير محدود".into()),
        status_label(code_status(c, now)).to_string(),
        date(Some(c.created_at)),
      ]
    }),
  )
}

/// Activity report; `student_name` resolves ids to display names.
pub fn export_report<'a>(activities: &[StudentActivity], student_name: impl Fn(&str) -> Option<&'a str>) -> String {
  render(
    REPORT_HEADERS,
    activities.iter().map(|a| {
      vec![
        student_name(&a.student_id).unwrap_or(a.student_id.as_str()).to_string(),
        a.activity_type.clone(),
        a.title.clone(),
        a.score.to_string(),
        a.time_spent.to_string(),
        a.words_studied.to_string(),
        date(Some(a.completed_at)),
      ]
    }),
  )
}

/// Blank import template: header line plus one example row.
pub fn import_template() -> String {
  let mut out = String::from(BOM);
  out.push_str(&IMPORT_HEADERS.join(","));
  out.push('\n');
  out.push_str("Sara Haddad,1001,3,parent@example.com,\n");
  out
}

#[derive(Debug, Default, PartialEq)]
pub struct ParsedImport {
  pub students: Vec<NewStudent>,
  pub skipped: usize,
}

/// Parse roster rows. The first line is the header. Rows with fewer than 3
/// fields or an empty name are skipped; a non-numeric grade becomes 1.
pub fn parse_student_import(text: &str) -> ParsedImport {
  let mut out = ParsedImport::default();
  let body = text.trim_start_matches(BOM);
  for line in body.lines().skip(1) {
    if line.trim().is_empty() {
      continue;
    }
    let cols: Vec<&str> = line.split(',').map(str::trim).collect();
    if cols.len() < 3 || cols[0].is_empty() {
      out.skipped += 1;
      continue;
    }
    let col = |i: usize| cols.get(i).copied().unwrap_or_default().to_string();
    out.students.push(NewStudent {
      name: cols[0].to_string(),
      student_number: col(1),
      grade: cols[2].parse().ok().filter(|g| (1..=12).contains(g)).unwrap_or(1),
      parent_email: col(3),
      notes: col(4),
    });
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Progress;

  #[test]
  fn import_skips_short_and_nameless_rows() {
    let text = "\u{feff}الاسم,رقم الطالب,الصف,البريد الإلكتروني لولي الأمر,ملاحظات\n\
      Ali,1,4,a@x.test,quiet\n\
      ,2,4\n\
      Huda,3\n\
      \n\
      Reem,5,seven\n";
    let parsed = parse_student_import(text);
    assert_eq!(parsed.students.len(), 2);
    assert_eq!(parsed.skipped, 2);
    assert_eq!(parsed.students[0].notes, "quiet");
    assert_eq!(parsed.students[1].grade, 1);
    assert_eq!(parsed.students[1].parent_email, "");
  }

  #[test]
  fn template_round_trips_through_import() {
    let parsed = parse_student_import(&import_template());
    assert_eq!(parsed, ParsedImport {
      students: vec![NewStudent {
        name: "Sara Haddad".into(),
        student_number: "1001".into(),
        grade: 3,
        parent_email: "parent@example.com".into(),
        notes: String::new(),
      }],
      skipped: 0,
    });
  }

  #[test]
  fn export_quotes_commas() {
    let s = Student {
      id: "s".into(),
      teacher_id: "t".into(),
      name: "Haddad, Sara".into(),
      student_number: "9".into(),
      grade: 2,
      parent_email: String::new(),
      notes: String::new(),
      progress: Progress { score: 10, ..Default::default() },
      achievements: vec![],
      last_active: None,
      created_at: Utc::now(),
    };
    let csv = export_students(&[s]);
    assert!(csv.starts_with(BOM));
    let lines: Vec<&str> = csv.trim_start_matches(BOM).lines().collect();
    assert_eq!(lines[0], STUDENT_HEADERS.join(","));
    assert!(lines[1].starts_with("\"Haddad, Sara\",9,2,"));
  }
}

//! Placeholder data and built-in content.
//!
//! Generators are pure over the random source they are handed, so a seeded
//! `StdRng` reproduces the same dashboard every time. What to generate (how
//! many students, which name lists) is decided by the callers.

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::access_codes::generate_random_code;
use crate::domain::*;

const FIRST_NAMES: &[&str] = &[
  "Ahmed", "Fatima", "Omar", "Layla", "Yousef", "Mariam", "Khalid", "Noor",
  "Hassan", "Sara", "Ali", "Huda", "Zaid", "Reem", "Tariq", "Aisha",
];

const LAST_NAMES: &[&str] = &[
  "Al-Harbi", "Al-Qahtani", "Haddad", "Nasser", "Khoury", "Saleh", "Mansour", "Farouk",
];

const SCHOOLS: &[&str] = &["Al Noor Primary", "Riverside School", "Future Leaders Academy"];

const ACTIVITY_TYPES: &[(&str, &str)] = &[
  ("vocabulary", "Vocabulary practice"),
  ("grammar", "Grammar drill"),
  ("reading", "Reading comprehension"),
  ("math", "Math problems"),
  ("test", "Unit test"),
];

const ACHIEVEMENTS: &[(&str, &str)] = &[
  ("First Steps", "Completed the first lesson"),
  ("Word Collector", "Learned 50 words"),
  ("On Fire", "Kept a 7-day streak"),
  ("Perfect Score", "Scored 100% on a test"),
];

/// Uuid v4 built from the supplied random source.
pub fn random_id(rng: &mut impl Rng) -> String {
  uuid::Builder::from_random_bytes(rng.gen()).into_uuid().to_string()
}

fn pick<'a>(rng: &mut impl Rng, items: &'a [&'a str]) -> &'a str {
  items.choose(rng).copied().unwrap_or_default()
}

fn days_ago(rng: &mut impl Rng, now: DateTime<Utc>, max_days: i64) -> DateTime<Utc> {
  now - Duration::minutes(rng.gen_range(0..max_days.max(1) * 24 * 60))
}

/// Default profile for a teacher seen for the first time.
pub fn sample_teacher(teacher_id: &str, now: DateTime<Utc>, rng: &mut impl Rng) -> Teacher {
  Teacher {
    id: teacher_id.to_string(),
    name: format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES)),
    email: String::new(),
    phone: String::new(),
    school: pick(rng, SCHOOLS).to_string(),
    subjects: vec!["English".into(), "Math".into()],
    grades: vec![rng.gen_range(1..=6)],
    created_at: now,
  }
}

pub fn sample_students(teacher_id: &str, n: usize, now: DateTime<Utc>, rng: &mut impl Rng) -> Vec<Student> {
  (0..n)
    .map(|i| {
      let sessions = rng.gen_range(1..40);
      let earned = rng.gen_range(0..=ACHIEVEMENTS.len());
      let achievements = ACHIEVEMENTS[..earned]
        .iter()
        .map(|(title, description)| Achievement {
          id: random_id(rng),
          title: (*title).to_string(),
          description: (*description).to_string(),
          earned_at: days_ago(rng, now, 60),
        })
        .collect();
      Student {
        id: random_id(rng),
        teacher_id: teacher_id.to_string(),
        name: format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES)),
        student_number: format!("{:04}", 1001 + i),
        grade: rng.gen_range(1..=6),
        parent_email: String::new(),
        notes: String::new(),
        progress: Progress {
          score: rng.gen_range(0..1000),
          streak: rng.gen_range(0..15),
          words_learned: rng.gen_range(0..300),
          study_sessions: sessions,
          total_study_time: sessions * rng.gen_range(5..30),
        },
        achievements,
        last_active: rng.gen_bool(0.8).then(|| days_ago(rng, now, 14)),
        created_at: days_ago(rng, now, 120),
      }
    })
    .collect()
}

pub fn sample_activities(students: &[Student], n: usize, now: DateTime<Utc>, rng: &mut impl Rng) -> Vec<StudentActivity> {
  if students.is_empty() {
    return Vec::new();
  }
  let mut out: Vec<StudentActivity> = (0..n)
    .filter_map(|_| {
      let student = students.choose(rng)?;
      let (kind, title) = ACTIVITY_TYPES.choose(rng)?;
      Some(StudentActivity {
        id: random_id(rng),
        student_id: student.id.clone(),
        teacher_id: student.teacher_id.clone(),
        activity_type: (*kind).to_string(),
        title: (*title).to_string(),
        score: rng.gen_range(40..=100),
        time_spent: rng.gen_range(3..45),
        words_studied: if *kind == "vocabulary" { rng.gen_range(5..30) } else { 0 },
        completed_at: days_ago(rng, now, 21),
      })
    })
    .collect();
  out.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
  out
}

/// One classroom per grade present among `students`.
pub fn sample_classrooms(teacher_id: &str, students: &[Student], now: DateTime<Utc>, rng: &mut impl Rng) -> Vec<ClassRoom> {
  let mut grades: Vec<u8> = students.iter().map(|s| s.grade).collect();
  grades.sort_unstable();
  grades.dedup();
  grades
    .into_iter()
    .map(|grade| ClassRoom {
      id: random_id(rng),
      teacher_id: teacher_id.to_string(),
      name: format!("Grade {grade}"),
      grade,
      student_ids: students.iter().filter(|s| s.grade == grade).map(|s| s.id.clone()).collect(),
      description: String::new(),
      created_at: now,
    })
    .collect()
}

pub fn sample_access_codes(teacher_id: &str, n: usize, now: DateTime<Utc>, rng: &mut impl Rng) -> Vec<AccessCode> {
  let mut out: Vec<AccessCode> = Vec::with_capacity(n);
  for _ in 0..n {
    let existing: Vec<&str> = out.iter().map(|c| c.code.as_str()).collect();
    let code = generate_random_code(&existing, rng);
    let max_usage = Some(rng.gen_range(10..=50));
    out.push(AccessCode {
      id: random_id(rng),
      teacher_id: teacher_id.to_string(),
      code,
      grade: rng.gen_range(1..=6),
      description: "Sample code".into(),
      expires_at: rng.gen_bool(0.5).then(|| now + Duration::days(rng.gen_range(7..60))),
      max_usage,
      usage_count: rng.gen_range(0..10),
      is_active: true,
      class_id: None,
      student_id: None,
      created_at: days_ago(rng, now, 30),
    });
  }
  out
}

// Built-in content shipped with the app. Authored entries with the same id
// replace these.

pub fn builtin_vocabulary() -> Vec<VocabularyWord> {
  let w = |id: &str, word: &str, tr: &str, ex: &str, grade: u8, unit: u32, topic: &str| VocabularyWord {
    id: id.into(), word: word.into(), translation: tr.into(), example: ex.into(), grade, unit, topic: topic.into(),
  };
  vec![
    w("v-apple", "apple", "تفاحة", "I eat an apple every day.", 1, 1, "food"),
    w("v-school", "school", "مدرسة", "We go to school by bus.", 1, 2, "places"),
    w("v-friend", "friend", "صديق", "She is my best friend.", 2, 1, "people"),
    w("v-library", "library", "مكتبة", "The library opens at nine.", 3, 2, "places"),
    w("v-weather", "weather", "طقس", "The weather is sunny today.", 3, 4, "nature"),
    w("v-journey", "journey", "رحلة", "The journey took three hours.", 5, 3, "travel"),
  ]
}

pub fn builtin_grammar() -> Vec<GrammarRule> {
  vec![
    GrammarRule {
      id: "g-present-simple".into(),
      title: "Present simple".into(),
      explanation: "Use the present simple for habits and facts. Add -s for he/she/it.".into(),
      examples: vec!["I play football.".into(), "She plays the piano.".into()],
      grade: 2,
      unit: 1,
    },
    GrammarRule {
      id: "g-past-simple".into(),
      title: "Past simple".into(),
      explanation: "Use the past simple for finished actions. Regular verbs add -ed.".into(),
      examples: vec!["We visited the museum.".into(), "He went home.".into()],
      grade: 4,
      unit: 3,
    },
    GrammarRule {
      id: "g-comparatives".into(),
      title: "Comparatives".into(),
      explanation: "Add -er or use 'more' to compare two things.".into(),
      examples: vec!["A cat is smaller than a dog.".into(), "This book is more interesting.".into()],
      grade: 5,
      unit: 2,
    },
  ]
}

pub fn builtin_math_problems() -> Vec<MathProblem> {
  let p = |id: &str, q: &str, a: &str, choices: &[&str], diff: &str, grade: u8, topic: &str| MathProblem {
    id: id.into(),
    question: q.into(),
    answer: a.into(),
    choices: choices.iter().map(|c| c.to_string()).collect(),
    difficulty: diff.into(),
    grade,
    topic: topic.into(),
  };
  vec![
    p("m-add-1", "7 + 5 = ?", "12", &["10", "11", "12", "13"], "easy", 1, "addition"),
    p("m-sub-1", "15 - 8 = ?", "7", &["6", "7", "8", "9"], "easy", 2, "subtraction"),
    p("m-mul-1", "6 × 7 = ?", "42", &["36", "42", "48", "49"], "medium", 3, "multiplication"),
    p("m-div-1", "56 ÷ 8 = ?", "7", &["6", "7", "8", "9"], "medium", 4, "division"),
    p("m-frac-1", "1/2 + 1/4 = ?", "3/4", &["2/6", "1/4", "3/4", "2/4"], "hard", 5, "fractions"),
  ]
}

pub fn builtin_quiz_questions() -> Vec<QuizQuestion> {
  let q = |id: &str, skill: &str, prompt: &str, options: &[&str], correct: usize, grade: u8, expl: &str| QuizQuestion {
    id: id.into(),
    skill: skill.into(),
    prompt: prompt.into(),
    options: options.iter().map(|o| o.to_string()).collect(),
    correct_index: correct,
    grade,
    explanation: expl.into(),
  };
  vec![
    q("q-voc-1", "vocabulary", "Which word means 'تفاحة'?", &["apple", "orange", "bread", "milk"], 0, 1, "apple = تفاحة"),
    q("q-voc-2", "vocabulary", "Where do you borrow books?", &["kitchen", "library", "garden", "bank"], 1, 3, "A library lends books."),
    q("q-voc-3", "vocabulary", "Choose the opposite of 'hot'.", &["warm", "sunny", "cold", "big"], 2, 2, "hot ↔ cold"),
    q("q-gr-1", "grammar", "She ___ to school every day.", &["go", "goes", "going", "gone"], 1, 2, "He/she/it takes -s in the present simple."),
    q("q-gr-2", "grammar", "Yesterday we ___ a film.", &["watch", "watches", "watched", "watching"], 2, 4, "Finished past action → past simple."),
    q("q-gr-3", "grammar", "A mouse is ___ than a cat.", &["small", "smaller", "smallest", "more small"], 1, 5, "Short adjectives add -er."),
    q("q-read-1", "reading", "'Tom has two dogs and a cat.' How many pets does Tom have?", &["two", "three", "four", "one"], 1, 2, "2 dogs + 1 cat = 3"),
  ]
}

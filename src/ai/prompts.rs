use crate::store::schema::SavedProblem;

pub const TUTOR_SYSTEM: &str = "You are a patient English tutor for Chinese middle and high \
school students. Explain in Simplified Chinese, quote English examples verbatim, and answer \
with an HTML fragment only (no <html>, <head> or <body>, no Markdown code fences).";

pub const VERIFY_INSTRUCTION: &str = "Transcribe the problem the student submitted. Keep the \
original wording, numbering, blanks (use ____) and answer options. Fix obvious OCR noise but do \
not solve anything. Reply with plain text only.";

pub const SOLVE_INSTRUCTION: &str = "Solve the following problem step by step. For each step \
name the grammar point or skill involved, explain why the answer is correct and why tempting \
wrong choices fail. Finish with a clearly marked final answer and a short summary of what to \
remember.";

pub const DRILLS_INSTRUCTION: &str = "Write three new practice problems that test the same \
knowledge points as the original problem at a similar difficulty. Put the answers and a one-line \
explanation for each in a separate section at the end.";

pub const SPEECH_INSTRUCTION: &str = "Read the following explanation aloud in a warm, clear \
teaching voice:";

pub const ANALYSIS_INSTRUCTION: &str = "Below is a student's collection of saved mistakes with \
their tags. Write a learning analysis report: group the problems by knowledge point, identify \
recurring weaknesses, and give a prioritized one-week study plan. Use headings, lists and a \
summary table.";

pub fn verify_prompt(text: &str) -> String {
    if text.trim().is_empty() {
        VERIFY_INSTRUCTION.to_string()
    } else {
        format!("{VERIFY_INSTRUCTION}\n\nTyped text from the student:\n{text}")
    }
}

pub fn solve_prompt(problem: &str) -> String {
    format!("{SOLVE_INSTRUCTION}\n\nProblem:\n{problem}")
}

pub fn drills_prompt(problem: &str, solution: &str) -> String {
    format!("{DRILLS_INSTRUCTION}\n\nOriginal problem:\n{problem}\n\nReference solution:\n{solution}")
}

pub fn speech_prompt(text: &str) -> String {
    format!("{SPEECH_INSTRUCTION}\n{text}")
}

pub fn analysis_prompt(problems: &[SavedProblem]) -> String {
    let mut out = String::from(ANALYSIS_INSTRUCTION);
    for (i, p) in problems.iter().enumerate() {
        let star = if p.is_favorite { " ★" } else { "" };
        out.push_str(&format!(
            "\n\n{}. [{}]{star}\n{}",
            i + 1,
            p.tags.join(", "),
            p.question_text
        ));
    }
    out
}

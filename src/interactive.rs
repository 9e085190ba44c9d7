use anyhow::{bail, Result};
use quiz_session::{Difficulty, Question, QuestionType, QuizGateway, QuizSession};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::render;

pub struct QuizSettings {
    pub num_questions: u32,
    pub difficulty: Difficulty,
    pub question_type: QuestionType,
    pub tips: bool,
}

pub async fn run_quiz<G: QuizGateway>(
    session: &QuizSession<G>,
    settings: QuizSettings,
) -> Result<()> {
    let quiz = session
        .generate(
            settings.num_questions,
            settings.difficulty,
            settings.question_type,
        )
        .await?;

    println!(
        "Quiz {} with {} question(s), {} difficulty",
        quiz.short_hash(),
        quiz.len(),
        settings.difficulty
    );

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    for (index, question) in quiz.questions.iter().enumerate() {
        render::print_question(index, question);

        loop {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;

            let input = match lines.next_line().await? {
                Some(input) => input,
                None => bail!("input closed before every question was answered"),
            };

            match resolve_choice(question, &input) {
                Some(option) => match session.select_answer(index, option) {
                    Ok(()) => break,
                    Err(e) => eprintln!("{e}"),
                },
                None => eprintln!(
                    "Pick a number from 1 to {} or type the option",
                    question.options.len()
                ),
            }
        }
    }

    let graded = session.submit().await?;

    render::print_message(&graded.review_message);
    println!("Saved to {}", graded.saved_artifact_ref);

    if settings.tips {
        let tips = session.request_tips().await?;

        render::print_message(&tips);
    }

    Ok(())
}

/// Accepts a 1-based option number or the option text itself.
fn resolve_choice<'a>(question: &'a Question, input: &str) -> Option<&'a str> {
    let input = input.trim();

    if let Ok(number) = input.parse::<usize>() {
        return number
            .checked_sub(1)
            .and_then(|index| question.options.get(index))
            .map(String::as_str);
    }

    question
        .options
        .iter()
        .find(|option| option.eq_ignore_ascii_case(input))
        .map(String::as_str)
}

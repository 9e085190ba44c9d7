use quiz_session::{ConversationMessage, Question, Role};

pub fn print_message(message: &ConversationMessage) {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };

    println!("[{speaker}]\n{}\n", message.content);
}

pub fn print_question(index: usize, question: &Question) {
    println!("\n{}. {}", index + 1, question.text);

    for (number, option) in question.options.iter().enumerate() {
        println!("   {}) {option}", number + 1);
    }
}

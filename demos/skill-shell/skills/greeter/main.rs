use skill_macros::tool;

/// Greets someone by name.
///
/// # Arguments
///
/// * `name` - who to greet
/// * `excited` - end with an exclamation mark
#[tool]
pub fn greet(name: String, excited: Option<bool>) -> String {
    let mark = if excited.unwrap_or(false) { "!" } else { "." };
    format!("Hello, {name}{mark}")
}

/// Counts the words in a text, in an isolated session.
///
/// # Arguments
///
/// * `text` - text to count
#[tool(sandboxed, timeout = 20)]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

use skill_macros::tool;

/// Adds two numbers.
#[tool]
fn add(a: i64, b: i64) -> i64 {
    a + b
}

#[tool(sandboxed, timeout = 5)]
fn shout(text: &str) -> String {
    text.to_uppercase()
}

#[tool(timeout = 1)]
async fn later(value: u8) -> u8 {
    value
}

#[test]
fn marker_leaves_functions_callable() {
    assert_eq!(add(2, 3), 5);
    assert_eq!(shout("hi"), "HI");
}

#[tokio::test]
async fn marker_keeps_async_functions() {
    assert_eq!(later(7).await, 7);
}

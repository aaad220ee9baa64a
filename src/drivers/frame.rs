/// Payload found between the framing markers of one response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame(pub String);
impl Frame {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
/// Returns the trimmed text strictly between the first `begin` and the first
/// `end` that follows it. `None` if either marker is missing.
pub fn extract_frame(response: &str, begin: &str, end: &str) -> Option<Frame> {
    let start = response.find(begin)? + begin.len();
    let stop = response[start..].find(end)? + start;
    Some(Frame(response[start..stop].trim().to_string()))
}

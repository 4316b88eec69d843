/// Insert `fill` after every line of `descriptor` that contains `marker`.
///
/// All other lines are kept verbatim and in order. A matching line without a
/// trailing newline (the last line of a file) gets one before the fill-in.
pub fn splice_after_marker(descriptor: &str, marker: &str, fill: &str) -> String {
    let mut out = String::with_capacity(descriptor.len() + fill.len());
    for line in descriptor.split_inclusive('\n') {
        out.push_str(line);
        if line.contains(marker) {
            if !line.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(fill);
        }
    }
    out
}

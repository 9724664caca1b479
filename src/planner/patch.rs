//! Line-oriented patch rendering for diff output.

/// Renders a unified-style line patch from `old` to `new`.
///
/// Unchanged lines are prefixed with two spaces, removed lines with `- ` and
/// added lines with `+ `.
#[must_use]
pub fn render_patch(old: &str, new: &str) -> String {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();
    let (n, m) = (a.len(), b.len());

    // lcs[i][j] = length of the longest common subsequence of a[i..] and b[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut out = String::from("--- remote\n+++ desired\n");
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            push_line(&mut out, "  ", a[i]);
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            push_line(&mut out, "- ", a[i]);
            i += 1;
        } else {
            push_line(&mut out, "+ ", b[j]);
            j += 1;
        }
    }
    for line in &a[i..] {
        push_line(&mut out, "- ", line);
    }
    for line in &b[j..] {
        push_line(&mut out, "+ ", line);
    }
    out
}

fn push_line(out: &mut String, prefix: &str, line: &str) {
    out.push_str(prefix);
    out.push_str(line);
    out.push('\n');
}

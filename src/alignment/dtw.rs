use crate::types::Utterance;
use crate::{RecognizerError, Result};

use super::templates::Template;

/// Predecessor chosen for a cell of the DTW table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Start,
    /// From `(x-1, y-1)`.
    Diagonal,
    /// From `(x-1, y)`: the state absorbs another frame.
    Vertical,
    /// From `(x, y-1)`: the frame is shared with the next state.
    Horizontal,
}

/// Alignment outcome produced by the DTW solver.
#[derive(Debug, Clone)]
pub struct DtwAlignment {
    pub log_likelihood: f64,
    /// `(frame, state)` pairs from `(0, 0)` to `(X-1, Y-1)`; each step advances
    /// one or both indices by exactly one.
    pub path: Vec<(usize, usize)>,
}

/// Executes a monotonic, gapless dynamic time warping of an utterance against
/// a template, maximising the summed Gaussian log-likelihood.
///
/// Exact ties between predecessors resolve diagonal first, then vertical,
/// then horizontal.
pub fn align(utterance: &Utterance, template: &Template) -> Result<DtwAlignment> {
    ensure_inputs(utterance, template)?;
    let rows = utterance.len();
    let cols = template.len();
    let mut scores = vec![f64::NEG_INFINITY; rows * cols];
    let mut steps = vec![Step::Start; rows * cols];
    fill_tables(&mut scores, &mut steps, utterance, template);

    let log_likelihood = scores[rows * cols - 1];
    if log_likelihood.is_nan() {
        return Err(RecognizerError::new("DTW produced a NaN log-likelihood"));
    }
    let path = backtrack(&steps, rows, cols)?;
    Ok(DtwAlignment {
        log_likelihood,
        path,
    })
}

fn ensure_inputs(utterance: &Utterance, template: &Template) -> Result<()> {
    if utterance.is_empty() {
        return Err(RecognizerError::new(
            "utterance must contain at least one frame",
        ));
    }
    if template.is_empty() {
        return Err(RecognizerError::new(
            "template must contain at least one state",
        ));
    }
    Ok(())
}

fn fill_tables(scores: &mut [f64], steps: &mut [Step], utterance: &Utterance, template: &Template) {
    let cols = template.len();
    let states = template.states();
    for x in 0..utterance.len() {
        let frame = utterance.cepstrum(x);
        for (y, state) in states.iter().enumerate() {
            let local = state.score(frame);
            let cell = x * cols + y;
            if x == 0 && y == 0 {
                scores[cell] = local;
                steps[cell] = Step::Start;
                continue;
            }
            let (best, step) = best_predecessor(scores, x, y, cols);
            scores[cell] = best + local;
            steps[cell] = step;
        }
    }
}

fn best_predecessor(scores: &[f64], x: usize, y: usize, cols: usize) -> (f64, Step) {
    let lookup = |px: Option<usize>, py: Option<usize>| match (px, py) {
        (Some(px), Some(py)) => scores[px * cols + py],
        _ => f64::NEG_INFINITY,
    };
    let candidates = [
        (lookup(x.checked_sub(1), y.checked_sub(1)), Step::Diagonal),
        (lookup(x.checked_sub(1), Some(y)), Step::Vertical),
        (lookup(Some(x), y.checked_sub(1)), Step::Horizontal),
    ];
    let mut best = candidates[0];
    for candidate in &candidates[1..] {
        if candidate.0 > best.0 || best.0.is_nan() {
            best = *candidate;
        }
    }
    if best.0 == f64::NEG_INFINITY {
        // Only reachable on the first row or column with -inf scores upstream;
        // keep the geometrically valid move so the path stays gapless.
        best.1 = if x == 0 {
            Step::Horizontal
        } else if y == 0 {
            Step::Vertical
        } else {
            Step::Diagonal
        };
    }
    best
}

fn backtrack(steps: &[Step], rows: usize, cols: usize) -> Result<Vec<(usize, usize)>> {
    let mut path = Vec::with_capacity(rows + cols);
    let (mut x, mut y) = (rows - 1, cols - 1);
    loop {
        path.push((x, y));
        match steps[x * cols + y] {
            Step::Start if x == 0 && y == 0 => break,
            Step::Diagonal if x > 0 && y > 0 => {
                x -= 1;
                y -= 1;
            }
            Step::Vertical if x > 0 => x -= 1,
            Step::Horizontal if y > 0 => y -= 1,
            step => {
                return Err(RecognizerError::new(format!(
                    "invalid DTW backtrack step {step:?} at ({x}, {y})"
                )))
            }
        }
    }
    path.reverse();
    Ok(path)
}

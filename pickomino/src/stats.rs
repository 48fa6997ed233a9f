//! Goodness-of-fit checks for a random dice source against the exact roll
//! distribution.

use crate::dice::{DiceCounts, DiceState, Face, NUM_FACES};
use claim::{debug_assert_ge, debug_assert_le};
use log::debug;
use ndarray::{Array1, ArrayView1, Zip};
use statrs::{
    distribution::{ChiSquared, ContinuousCDF},
    StatsError,
};
use std::collections::HashMap;

const EPS: f64 = 1e-10;

/// Return true iff `supp(p) ⊆ supp(q)` for dense PMFs `p` and `q`.
pub fn is_pmf_subset(p: ArrayView1<f64>, q: ArrayView1<f64>) -> bool {
    Zip::from(p).and(q).all(|&p_i, &q_i| {
        // A = (q_i == 0.0)
        // B = (p_i == 0.0)
        // (A ==> B) <==> (¬A ∨ B)
        (q_i > 0.0) || (p_i <= 0.0)
    })
}

/// Compute the [KL-divergence](https://www.wikiwand.com/en/Kullback%E2%80%93Leibler_divergence).
/// between dense PMFs `p` and `q`.
///
/// `D_{KL}(p || q) = \sum_i p_i * \ln(p_i / q_i)`
///
/// Note: p's support must be a subset of q's support, i.e., `q_i = 0` implies
///       `p_i = 0`.
pub fn kl_divergence(p: ArrayView1<f64>, q: ArrayView1<f64>) -> f64 {
    debug_assert!(is_pmf_subset(p, q));

    Zip::from(p)
        .and(q)
        .fold(0.0, |sum, &p_i, &q_i| sum + kl_div_term(p_i, q_i))
}

#[inline]
fn kl_div_term(p_i: f64, q_i: f64) -> f64 {
    if p_i <= EPS {
        0.0
    } else if q_i > EPS {
        p_i * (p_i / q_i).ln()
    } else {
        f64::INFINITY
    }
}

/// The G-test statistic for comparing an observed multinomial distribution
/// `p_hat` (from `n` samples) against the hypothesized distribution `p`.
/// Asymptotically approximates the chi^2-test statistic.
///
/// G-test: https://www.wikiwand.com/en/G-test
pub fn g_test(n: usize, p: ArrayView1<f64>, p_hat: ArrayView1<f64>) -> f64 {
    (n as f64) * (2.0 * kl_divergence(p_hat, p))
}

/// The CDF of the Chi^2-distribution, where `dof` is the
/// "degrees-of-freedom" parameter and `x ∈ R`.
pub fn chisq_cdf(dof: f64, x: f64) -> Result<f64, StatsError> {
    Ok(ChiSquared::new(dof)?.cdf(x))
}

/// A goodness-of-fit test between a hypothesized multinomial distribution, `p`,
/// and an experimentally observed distribution, `p_hat`, both represented as
/// dense PMFs. `n` is the number of samples taken to construct `p_hat`.
///
/// Returns a p-value, `Pr[G(x) >= g | H_0: x ~ p]`.
pub fn multinomial_test(
    n: usize,
    p: ArrayView1<f64>,
    p_hat: ArrayView1<f64>,
) -> Result<f64, StatsError> {
    // the DOF is the nnz of p minus one
    let nnz = p.fold(0.0, |nnz, &x| nnz + if x > 0.0 { 1.0 } else { 0.0 });
    let dof = nnz - 1.0;

    debug_assert_le!(nnz, p.dim() as f64);
    debug_assert_ge!(dof, 1.0);

    // impossible to draw p_hat from p
    if !is_pmf_subset(p_hat, p) {
        return Ok(0.0);
    }

    let g = g_test(n, p, p_hat);
    let pvalue = 1.0 - chisq_cdf(dof, g)?;

    debug!(
        "multinomial_test: n: {}, |p|: {}, dof: {}, g: {}, p-value: {}",
        n,
        p.dim(),
        dof,
        g,
        pvalue
    );

    Ok(pvalue)
}

///////////////
// FitReport //
///////////////

#[derive(Clone, Debug)]
pub struct FitReport {
    pub ndice: u8,
    pub samples: usize,
    /// the exact probability of each enumerated outcome.
    pub outcomes: Vec<DiceState>,
    /// the observed frequency of each outcome, in the same order.
    pub p_hat: Array1<f64>,
    /// p-value of the observed rolls against the exact roll distribution.
    pub roll_p_value: f64,
    /// how many dice came up with each face, over all samples.
    pub face_counts: [usize; NUM_FACES],
    /// p-value of the per-die faces against a fair die.
    pub face_p_value: f64,
    /// the largest absolute difference between expected and observed outcome
    /// frequencies.
    pub max_abs_diff: f64,
}

/// Draw `samples` rolls of `ndice` dice from `sample` and test them against
/// the exact enumerated distribution.
///
/// Panics if `ndice` is zero, or if `sample` returns a roll with the wrong
/// number of dice.
pub fn fit_roll_sampler<F>(
    ndice: u8,
    samples: usize,
    mut sample: F,
) -> Result<FitReport, StatsError>
where
    F: FnMut() -> DiceCounts,
{
    assert!(ndice > 0, "need at least one die to test");

    let outcomes = DiceState::all(ndice).collect::<Vec<_>>();
    let outcome_idxs = outcomes
        .iter()
        .enumerate()
        .map(|(idx, outcome)| (outcome.counts(), idx))
        .collect::<HashMap<_, _>>();

    let mut roll_counts = Array1::<f64>::zeros(outcomes.len());
    let mut face_counts = [0_usize; NUM_FACES];

    for _ in 0..samples {
        let roll = sample();
        assert_eq!(ndice, roll.len(), "sampled the wrong number of dice");

        roll_counts[outcome_idxs[&roll]] += 1.0;
        for (face, count) in roll.faces() {
            face_counts[face.idx() as usize] += count as usize;
        }
    }

    let n = samples.max(1);
    let p = outcomes.iter().map(DiceState::prob).collect::<Array1<f64>>();
    let p_hat = roll_counts / (n as f64);

    let roll_p_value = multinomial_test(n, p.view(), p_hat.view())?;

    let ndice_total = (n * ndice as usize) as f64;
    let p_face = Array1::from_elem(NUM_FACES, 1.0 / NUM_FACES as f64);
    let p_hat_face = face_counts
        .iter()
        .map(|&count| (count as f64) / ndice_total)
        .collect::<Array1<f64>>();
    let face_p_value = multinomial_test(n * ndice as usize, p_face.view(), p_hat_face.view())?;

    let max_abs_diff = Zip::from(&p)
        .and(&p_hat)
        .fold(0.0_f64, |max, &p_i, &p_hat_i| max.max((p_i - p_hat_i).abs()));

    debug!(
        "fit_roll_sampler: ndice: {}, samples: {}, face counts: {:?}, roll p-value: {}, face p-value: {}",
        ndice,
        samples,
        Face::all()
            .iter()
            .map(|face| (face.symbol(), face_counts[face.idx() as usize]))
            .collect::<Vec<_>>(),
        roll_p_value,
        face_p_value,
    );

    Ok(FitReport {
        ndice,
        samples,
        outcomes,
        p_hat,
        roll_p_value,
        face_counts,
        face_p_value,
        max_abs_diff,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use claim::{assert_gt, assert_lt};
    use ndarray::array;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoroshiro64Star;

    #[test]
    fn test_is_pmf_subset() {
        let p = array![0.0, 0.0, 1.0];
        let q = array![0.0, 1.0, 1.0];

        assert!(is_pmf_subset(p.view(), p.view()));
        assert!(is_pmf_subset(q.view(), q.view()));
        assert!(is_pmf_subset(p.view(), q.view()));
        assert!(!is_pmf_subset(q.view(), p.view()));
    }

    #[test]
    fn test_kl_divergence() {
        let p = array![0.1, 0.3, 0.6];
        let q = array![0.3, 0.3, 0.4];

        assert_relative_eq!(0.0_f64, kl_divergence(p.view(), p.view()));
        assert_relative_eq!(0.0_f64, kl_divergence(q.view(), q.view()));

        // D_KL(p || q) = (0.1 * ln(0.1 / 0.3))
        //              + (0.3 * ln(0.3 / 0.3))
        //              + (0.6 * ln(0.6 / 0.4))
        //              = 0.13341783599808757
        assert_relative_eq!(0.13341783599808757_f64, kl_divergence(p.view(), q.view()));
        assert_relative_eq!(0.16739764335716714_f64, kl_divergence(q.view(), p.view()));
    }

    #[test]
    fn test_chisq_cdf() {
        assert_relative_eq!(0.0, chisq_cdf(3.0, 0.0).unwrap());
        // median of chi^2 with 2 dof is 2 ln 2
        assert_relative_eq!(0.5, chisq_cdf(2.0, 2.0 * 2.0_f64.ln()).unwrap(), epsilon = 1e-9);
        assert!(chisq_cdf(-1.0, 1.0).is_err());
    }

    #[test]
    fn test_multinomial_test_impossible_sample() {
        let p = array![0.5, 0.5, 0.0];
        let p_hat = array![0.4, 0.4, 0.2];
        assert_eq!(0.0, multinomial_test(10, p.view(), p_hat.view()).unwrap());
    }

    // a die that comes up worm 2/7 of the time.
    fn biased_roll<R: Rng>(rng: &mut R, ndice: u8) -> DiceCounts {
        (0..ndice)
            .map(|_| Face::from_idx(rng.gen_range(0..7_u8).min(5)))
            .collect()
    }

    #[test]
    fn test_fit_fair_vs_biased() {
        let mut rng = Xoroshiro64Star::seed_from_u64(0xd15c0);

        for ndice in [1, 2, 3] {
            let n = 20_000;

            let fair = fit_roll_sampler(ndice, n, || DiceCounts::roll(&mut rng, ndice)).unwrap();
            assert_eq!(n * ndice as usize, fair.face_counts.iter().sum::<usize>());
            assert_relative_eq!(1.0, fair.p_hat.sum(), epsilon = 1e-9);
            assert_gt!(fair.roll_p_value, 1e-4);
            assert_gt!(fair.face_p_value, 1e-4);
            assert_lt!(fair.max_abs_diff, 0.02);

            let biased = fit_roll_sampler(ndice, n, || biased_roll(&mut rng, ndice)).unwrap();
            assert_lt!(biased.roll_p_value, 1e-4);
            assert_lt!(biased.face_p_value, 1e-4);
        }
    }
}

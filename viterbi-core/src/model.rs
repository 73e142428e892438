//! # Contratos dos Modelos de Probabilidade
//!
//! O decodificador não sabe nada sobre features, classificadores ou
//! dicionários: ele consome apenas dois modelos fornecidos pelo chamador.
//!
//! - **Emissão** ([`EmissionProbabilityModel`]): dado um valor observado `y`,
//!   quais estados ocultos podem tê-lo gerado e com que log-probabilidade.
//! - **Transição** ([`TransitionProbabilityModel`]): dada a redução `r` do
//!   histórico recente, qual a log-probabilidade de o próximo estado ser `s`.
//!
//! ## Convenção numérica
//!
//! Todas as probabilidades trafegam como **log10**. Probabilidade zero é
//! `f64::NEG_INFINITY` (ou um valor negativo grande); `NaN` nunca é válido.
//!
//! $$ \log_{10}(P(y|s) \cdot P(s|r)) = \log_{10} P(y|s) + \log_{10} P(s|r) $$

use serde::{Deserialize, Serialize};

/// Um estado oculto possível para a observação corrente.
///
/// Modelos omitem estados impossíveis em vez de devolver `-∞`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate<S> {
    pub state: S,
    /// log10 P(observação | estado)
    pub emission_log_probability: f64,
}

impl<S> Candidate<S> {
    pub fn new(state: S, emission_log_probability: f64) -> Self {
        Self {
            state,
            emission_log_probability,
        }
    }

    /// Candidato a partir de uma probabilidade bruta em `[0, 1]`.
    pub fn from_probability(state: S, probability: f64) -> Self {
        Self::new(state, log_probability(probability))
    }
}

/// Modelo de emissão: `P(y | s)` para os estados compatíveis com `y`.
///
/// Deve ser uma função pura: o decodificador a chama exatamente uma vez por
/// passo.
pub trait EmissionProbabilityModel<S, Y: ?Sized> {
    /// Estados com probabilidade de emissão não-nula para `observation`.
    fn candidates(&self, observation: &Y) -> Vec<Candidate<S>>;
}

/// Modelo de transição: `P(s | r)` onde `r` é a redução do histórico.
///
/// Transições impossíveis devolvem um valor muito negativo (ou `-∞`), nunca
/// `NaN`; entradas apenas improváveis nunca falham.
pub trait TransitionProbabilityModel<S, R> {
    fn transition_log_probability(&self, reduction: &R, state: &S) -> f64;
}

impl<S, Y: ?Sized, M> EmissionProbabilityModel<S, Y> for &M
where
    M: EmissionProbabilityModel<S, Y> + ?Sized,
{
    fn candidates(&self, observation: &Y) -> Vec<Candidate<S>> {
        (**self).candidates(observation)
    }
}

impl<S, R, M> TransitionProbabilityModel<S, R> for &M
where
    M: TransitionProbabilityModel<S, R> + ?Sized,
{
    fn transition_log_probability(&self, reduction: &R, state: &S) -> f64 {
        (**self).transition_log_probability(reduction, state)
    }
}

/// `log10(p)`; `p = 0` vira `-∞`.
pub fn log_probability(probability: f64) -> f64 {
    probability.log10()
}

/// Inverso de [`log_probability`].
pub fn probability(log_probability: f64) -> f64 {
    10f64.powf(log_probability)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Uniform;

    impl EmissionProbabilityModel<char, str> for Uniform {
        fn candidates(&self, observation: &str) -> Vec<Candidate<char>> {
            observation
                .chars()
                .map(|c| Candidate::from_probability(c, 1.0 / observation.len() as f64))
                .collect()
        }
    }

    #[test]
    fn test_log_conversions() {
        assert_eq!(log_probability(1.0), 0.0);
        assert!((log_probability(0.01) + 2.0).abs() < 1e-12);
        assert_eq!(log_probability(0.0), f64::NEG_INFINITY);
        assert!((probability(-1.0) - 0.1).abs() < 1e-12);
        assert_eq!(probability(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_model_by_reference() {
        fn count<M: EmissionProbabilityModel<char, str>>(model: M, y: &str) -> usize {
            model.candidates(y).len()
        }
        let model = Uniform;
        // A mesma instância pode servir várias sessões via &M
        assert_eq!(count(&model, "ab"), 2);
        assert_eq!(count(&model, "xyz"), 3);

        let candidates = model.candidates("ab");
        assert!((candidates[0].emission_log_probability - 0.5f64.log10()).abs() < 1e-12);
    }
}

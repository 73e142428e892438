//! # Modelos em Tabela
//!
//! Implementações simples dos dois contratos de [`crate::model`], guardadas em
//! dicionários em **log-space**, no mesmo formato chave→log-probabilidade
//! que um HMM clássico usa:
//!
//! - [`EmissionTable`]: observação → lista de candidatos.
//! - [`TransitionTable`]: redução → (estado → log-probabilidade).
//!
//! As tabelas são serializáveis com serde, então podem vir de JSON ou de
//! qualquer outro formato. Elas não treinam nada: quem as preenche é o chamador.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::model::{
    log_probability, Candidate, EmissionProbabilityModel, TransitionProbabilityModel,
};

/// Tabela de emissão `observação → candidatos`.
///
/// Observações ausentes devolvem os candidatos de `unknown` (vazio por
/// padrão, o que faz o decodificador registrar um skip naquele passo).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "S: Serialize, Y: Serialize + Eq + Hash",
    deserialize = "S: Deserialize<'de>, Y: Deserialize<'de> + Eq + Hash"
))]
pub struct EmissionTable<S, Y> {
    emissions: HashMap<Y, Vec<Candidate<S>>>,
    #[serde(default)]
    unknown: Vec<Candidate<S>>,
}

impl<S, Y: Eq + Hash> EmissionTable<S, Y> {
    pub fn new() -> Self {
        Self {
            emissions: HashMap::new(),
            unknown: Vec::new(),
        }
    }

    /// Registra `log10 P(observation | state)`.
    pub fn insert(&mut self, observation: Y, state: S, emission_log_probability: f64) {
        self.emissions
            .entry(observation)
            .or_default()
            .push(Candidate::new(state, emission_log_probability));
    }

    /// Como [`insert`](Self::insert), a partir de uma probabilidade bruta.
    pub fn insert_probability(&mut self, observation: Y, state: S, probability: f64) {
        self.insert(observation, state, log_probability(probability));
    }

    /// Candidatos usados para observações fora da tabela.
    pub fn set_unknown(&mut self, candidates: Vec<Candidate<S>>) {
        self.unknown = candidates;
    }

    /// Número de observações conhecidas.
    pub fn len(&self) -> usize {
        self.emissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emissions.is_empty()
    }
}

impl<S, Y: Eq + Hash> Default for EmissionTable<S, Y> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, Y, Q> EmissionProbabilityModel<S, Q> for EmissionTable<S, Y>
where
    S: Clone,
    Y: Eq + Hash + Borrow<Q>,
    Q: Eq + Hash + ?Sized,
{
    fn candidates(&self, observation: &Q) -> Vec<Candidate<S>> {
        self.emissions
            .get(observation)
            .unwrap_or(&self.unknown)
            .clone()
    }
}

fn impossible() -> f64 {
    f64::NEG_INFINITY
}

fn is_impossible(value: &f64) -> bool {
    *value == f64::NEG_INFINITY
}

/// Tabela de transição `redução → estado → log10 P(estado | redução)`.
///
/// Pares ausentes valem `floor`: `-∞` por padrão (transição impossível). Um
/// `floor` finito funciona como suavização epsilon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "R: Serialize + Eq + Hash, S: Serialize + Eq + Hash",
    deserialize = "R: Deserialize<'de> + Eq + Hash, S: Deserialize<'de> + Eq + Hash"
))]
pub struct TransitionTable<R, S> {
    transitions: HashMap<R, HashMap<S, f64>>,
    #[serde(default = "impossible", skip_serializing_if = "is_impossible")]
    floor: f64,
}

impl<R: Eq + Hash, S: Eq + Hash> TransitionTable<R, S> {
    pub fn new() -> Self {
        Self {
            transitions: HashMap::new(),
            floor: impossible(),
        }
    }

    /// Log-probabilidade devolvida para pares não registrados.
    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = floor;
        self
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    /// Registra `log10 P(state | reduction)`, substituindo valor anterior.
    pub fn insert(&mut self, reduction: R, state: S, log_probability: f64) {
        self.transitions
            .entry(reduction)
            .or_default()
            .insert(state, log_probability);
    }

    pub fn insert_probability(&mut self, reduction: R, state: S, probability: f64) {
        self.insert(reduction, state, log_probability(probability));
    }

    /// Valor registrado, sem aplicar o `floor`.
    pub fn get(&self, reduction: &R, state: &S) -> Option<f64> {
        self.transitions.get(reduction)?.get(state).copied()
    }
}

impl<R: Eq + Hash, S: Eq + Hash> Default for TransitionTable<R, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Eq + Hash, S: Eq + Hash> TransitionProbabilityModel<S, R> for TransitionTable<R, S> {
    fn transition_log_probability(&self, reduction: &R, state: &S) -> f64 {
        self.get(reduction, state).unwrap_or(self.floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emission_lookup_by_borrowed_key() {
        let mut table: EmissionTable<&str, String> = EmissionTable::new();
        table.insert_probability("can".to_string(), "VERB", 0.3);
        table.insert_probability("can".to_string(), "NOUN", 0.7);

        let candidates = table.candidates("can");
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].state, "VERB");
        assert!(EmissionProbabilityModel::<&str, str>::candidates(&table, "tin").is_empty());
    }

    #[test]
    fn test_emission_unknown_fallback() {
        let mut table: EmissionTable<char, String> = EmissionTable::new();
        table.insert("a".to_string(), 'A', 0.0);
        table.set_unknown(vec![Candidate::new('X', -3.0)]);

        let unknown = table.candidates("zzz");
        assert_eq!(unknown, vec![Candidate::new('X', -3.0)]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_transition_floor() {
        let mut table: TransitionTable<char, char> = TransitionTable::new();
        table.insert_probability('A', 'B', 0.5);

        assert!((table.transition_log_probability(&'A', &'B') - 0.5f64.log10()).abs() < 1e-12);
        assert_eq!(table.transition_log_probability(&'A', &'C'), f64::NEG_INFINITY);

        let smoothed = table.with_floor(-6.0);
        assert_eq!(smoothed.transition_log_probability(&'A', &'C'), -6.0);
        assert_eq!(smoothed.get(&'A', &'C'), None);
    }

    #[test]
    fn test_tables_from_json() {
        let emissions: EmissionTable<String, String> = serde_json::from_str(
            r#"{"emissions": {"x": [{"state": "A", "emission_log_probability": -0.5}]}}"#,
        )
        .unwrap();
        assert_eq!(emissions.candidates("x")[0].state, "A");
        assert!(emissions.candidates("y").is_empty());

        let transitions: TransitionTable<String, String> =
            serde_json::from_str(r#"{"transitions": {"A": {"B": -0.3}}}"#).unwrap();
        assert_eq!(transitions.floor(), f64::NEG_INFINITY);
        assert_eq!(
            transitions.transition_log_probability(&"A".to_string(), &"B".to_string()),
            -0.3
        );

        // -∞ é omitido na serialização e volta pelo default
        let json = serde_json::to_string(&transitions).unwrap();
        assert!(!json.contains("floor"));
        let back: TransitionTable<String, String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.floor(), f64::NEG_INFINITY);
    }
}

use crate::agent::{Agent, AgentId};
use rayon::prelude::*;

/// All live agents, in insertion order. Agents are never removed.
#[derive(Clone, Debug, Default)]
pub struct AgentStore {
    agents: Vec<Agent>,
    next_id: u64,
}

impl AgentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Agent> {
        self.agents.get(index)
    }

    pub fn get_by_id(&self, id: AgentId) -> Option<&Agent> {
        // Ids are handed out in increasing order, so the store is sorted by id.
        self.agents
            .binary_search_by_key(&id, |a| a.id())
            .ok()
            .map(|idx| &self.agents[idx])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Agent> {
        self.agents.iter()
    }

    pub fn as_slice(&self) -> &[Agent] {
        &self.agents
    }

    pub fn next_id(&self) -> AgentId {
        AgentId(self.next_id)
    }

    /// Assign the next id and store the agent.
    pub(crate) fn append(&mut self, mut agent: Agent) -> AgentId {
        let id = AgentId(self.next_id);
        self.next_id += 1;
        agent.state.id = id;
        self.agents.push(agent);
        id
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Agent> {
        self.agents.get_mut(index)
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Agent> {
        self.agents.iter_mut()
    }

    pub(crate) fn par_iter_mut(&mut self) -> rayon::slice::IterMut<'_, Agent> {
        self.agents.par_iter_mut()
    }
}

impl<'a> IntoIterator for &'a AgentStore {
    type Item = &'a Agent;
    type IntoIter = std::slice::Iter<'a, Agent>;

    fn into_iter(self) -> Self::IntoIter {
        self.agents.iter()
    }
}

//! Track List
//!
//! The catalogue the shuffle picker draws from, loaded from a
//! `tracklist.json` array of `{ name, artist_name, audio }` entries.

use crate::error::ModulationError;
use crate::port::SourceRef;
use crate::random::RandomRange;
use rand::RngCore;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub artist_name: String,
    /// Location of the audio file
    pub audio: String,
}

impl Track {
    pub fn source(&self) -> SourceRef {
        SourceRef::new(self.audio.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackList {
    tracks: Vec<Track>,
}

impl TrackList {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub fn from_json(json: &str) -> Result<Self, ModulationError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    /// Uniformly random track, `None` for an empty list
    pub fn pick_random<R: RngCore>(&self, random: &mut RandomRange<R>) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }
        self.tracks.get(random.index(self.tracks.len()))
    }

    /// Random track other than `current` when the list allows it
    pub fn pick_next<R: RngCore>(
        &self,
        random: &mut RandomRange<R>,
        current: Option<&SourceRef>,
    ) -> Option<&Track> {
        let candidates: Vec<&Track> = self
            .tracks
            .iter()
            .filter(|t| current.map_or(true, |c| t.audio != c.as_str()))
            .collect();
        if candidates.is_empty() {
            return self.pick_random(random);
        }
        candidates.get(random.index(candidates.len())).copied()
    }
}

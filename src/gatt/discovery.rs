use std::mem;
use std::ops::RangeBounds;

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::att::{ErrorCode, Handle, HandleRange};
use crate::Error;

use super::*;

/// Discovery progress reported after a completion event.
#[derive(Debug)]
pub enum Progress {
    /// The next round must be requested from the transport.
    Request(DiscReq),
    /// Discovery finished with the specified result.
    Done(crate::Result<ServiceContent>),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Phase {
    Service,
    Included,
    Chars,
    Descs,
}

impl Phase {
    const fn procedure(self) -> Procedure {
        match self {
            Self::Service => Procedure::DiscPrimary,
            Self::Included => Procedure::DiscIncluded,
            Self::Chars => Procedure::DiscChars,
            Self::Descs => Procedure::DiscDescs,
        }
    }
}

/// Table-driven discovery of one peer service. The caller forwards
/// transport indications and completion events and issues every
/// [`DiscReq`] it is given until [`Progress::Done`].
#[derive(Debug)]
pub struct Discovery {
    tpl: &'static SvcTemplate,
    phase: Phase,
    matches: usize,
    content: ServiceContent,
    decls: SmallVec<[Handle; 8]>,
    owners: SmallVec<[usize; 4]>,
    owner: Option<usize>,
    complete: bool,
}

impl Discovery {
    /// Starts discovery of the service described by `tpl`. Returns the
    /// engine and the primary service request.
    #[must_use]
    pub fn start(tpl: &'static SvcTemplate) -> (Self, DiscReq) {
        debug!("Discovering service {}", tpl.uuid);
        let d = Self {
            tpl,
            phase: Phase::Service,
            matches: 0,
            content: ServiceContent::new(tpl),
            decls: SmallVec::new(),
            owners: SmallVec::new(),
            owner: None,
            complete: false,
        };
        let req = DiscReq::Service {
            uuid: tpl.uuid,
            range: HandleRange::ALL,
            incl: false,
        };
        (d, req)
    }

    /// Returns the number of matching services reported so far.
    #[inline(always)]
    #[must_use]
    pub const fn matches(&self) -> usize {
        self.matches
    }

    /// Handles a service found indication.
    pub fn on_svc(&mut self, ind: &SvcInd) {
        if !matches!(self.phase, Phase::Service | Phase::Included) {
            warn!("Unexpected service indication during {:?}", self.phase);
            return;
        }
        if ind.uuid != self.tpl.uuid {
            trace!("Ignoring service {}", ind.uuid);
            return;
        }
        self.matches += 1;
        if self.matches > 1 {
            debug!("Additional {} match at {:?}", ind.uuid, ind.range);
            return;
        }
        self.content.set_range(ind.range);
        if !ind.atts.is_empty() {
            self.extract(&ind.atts);
            self.complete = true;
        }
    }

    /// Handles a characteristic found indication.
    pub fn on_char(&mut self, ind: &CharInd) {
        if self.phase != Phase::Chars {
            warn!("Unexpected characteristic indication during {:?}", self.phase);
            return;
        }
        self.add_char(ind);
    }

    /// Handles a descriptor found indication.
    pub fn on_desc(&mut self, ind: &DescInd) {
        let (Phase::Descs, Some(owner)) = (self.phase, self.owner) else {
            warn!("Unexpected descriptor indication during {:?}", self.phase);
            return;
        };
        if (self.desc_range(owner)).map_or(false, |r| r.contains(&ind.hdl)) {
            self.add_desc(owner, ind);
        } else {
            warn!("Descriptor {} outside of the requested range", ind.hdl);
        }
    }

    /// Handles a completion event. Returns [`None`] if the event does not
    /// complete the current round.
    pub fn on_cmp(&mut self, cmp: &Cmp) -> Option<Progress> {
        if cmp.op != self.phase.procedure() {
            warn!("Unexpected {} completion during {:?}", cmp.op, self.phase);
            return None;
        }
        if let Err(e) = cmp.status {
            if !ErrorCode::is_benign(&cmp.status) {
                debug!("Discovery aborted by {e}");
                return Some(Progress::Done(Err(Error::Att(e))));
            }
        }
        Some(match self.phase {
            Phase::Service | Phase::Included => self.located(),
            Phase::Chars => self.chars_done(),
            Phase::Descs => self.next_owner(),
        })
    }

    /// Evaluates the service search result.
    fn located(&mut self) -> Progress {
        match self.matches {
            0 if self.phase == Phase::Service => {
                debug!("Primary {} not found, searching included services", self.tpl.uuid);
                self.phase = Phase::Included;
                Progress::Request(DiscReq::Service {
                    uuid: self.tpl.uuid,
                    range: HandleRange::ALL,
                    incl: true,
                })
            }
            0 => Progress::Done(Err(DiscoveryError::ServiceMissing.into())),
            1 if self.complete => self.finish(),
            1 => {
                self.phase = Phase::Chars;
                Progress::Request(DiscReq::Chars {
                    range: self.content.range(),
                })
            }
            _ => Progress::Done(Err(DiscoveryError::MultipleServicesFound.into())),
        }
    }

    /// Validates characteristics and schedules descriptor rounds for every
    /// found owner of a descriptor template.
    fn chars_done(&mut self) -> Progress {
        if let Err(e) = self.tpl.check_chars(&self.content) {
            return Progress::Done(Err(e.into()));
        }
        self.owners.clear();
        for t in self.tpl.descs {
            let found = (self.content.chars().get(t.owner)).map_or(false, |c| c.val.is_some());
            if found && !self.owners.contains(&t.owner) {
                self.owners.push(t.owner);
            }
        }
        self.owners.reverse();
        self.phase = Phase::Descs;
        self.next_owner()
    }

    /// Requests descriptors of the next owner or finishes discovery.
    fn next_owner(&mut self) -> Progress {
        while let Some(o) = self.owners.pop() {
            if let Some(range) = self.desc_range(o) {
                self.owner = Some(o);
                return Progress::Request(DiscReq::Descs { range });
            }
            trace!("Characteristic {o} has no descriptors");
        }
        self.owner = None;
        self.finish()
    }

    /// Performs final validation and returns the service content.
    fn finish(&mut self) -> Progress {
        let r = (self.tpl.check_chars(&self.content))
            .and_then(|()| self.tpl.check_descs(&self.content));
        Progress::Done(match r {
            Ok(()) => {
                let c = mem::replace(&mut self.content, ServiceContent::new(self.tpl));
                debug!("Discovered {} at {:?}", self.tpl.uuid, c.range());
                Ok(c)
            }
            Err(e) => Err(e.into()),
        })
    }

    /// Returns the descriptor handle range of characteristic slot `owner`:
    /// from its value handle up to the next characteristic declaration or
    /// the end of the service.
    fn desc_range(&self, owner: usize) -> Option<HandleRange> {
        let val = self.content.chars().get(owner)?.val?;
        let next = (self.decls.iter().copied()).filter(|&d| d > val).min();
        let end = match next {
            Some(d) => d.prev()?,
            None => self.content.range().end(),
        };
        HandleRange::try_new(val.next()?, end)
    }

    /// Fills the first empty template slot matching the characteristic.
    /// Returns the slot index.
    fn add_char(&mut self, ind: &CharInd) -> Option<usize> {
        let r = self.content.range();
        if !r.contains(&ind.decl) || !r.contains(&ind.val) {
            warn!("Characteristic {} outside of {r:?}", ind.val);
            return None;
        }
        self.decls.push(ind.decl);
        let i = (self.tpl.chars.iter().zip(self.content.chars()))
            .position(|(t, c)| t.uuid == ind.uuid && c.val.is_none())?;
        trace!("Characteristic {} -> slot {i}", ind.uuid);
        self.content.chars_mut()[i] = DiscChar::new(ind.val, ind.props, ind.uuid);
        Some(i)
    }

    /// Fills the first empty descriptor slot of `owner` matching the
    /// descriptor.
    fn add_desc(&mut self, owner: usize, ind: &DescInd) {
        let j = (self.tpl.descs.iter().zip(self.content.descs()))
            .position(|(t, d)| t.owner == owner && t.uuid == ind.uuid && d.hdl.is_none());
        if let Some(j) = j {
            trace!("Descriptor {} -> slot {j}", ind.uuid);
            self.content.descs_mut()[j] = DiscDesc::new(ind.hdl, ind.uuid);
        }
    }

    /// Extracts characteristics and descriptors from a service attribute
    /// list.
    fn extract(&mut self, atts: &[SvcAtt]) {
        let mut owner = None;
        for att in atts {
            match *att {
                SvcAtt::Char {
                    decl,
                    val,
                    props,
                    uuid,
                } => {
                    owner = self.add_char(&CharInd {
                        decl,
                        val,
                        props,
                        uuid,
                    });
                }
                SvcAtt::Desc { hdl, uuid } => {
                    let r = self.content.range();
                    if let (Some(o), true) = (owner, r.contains(&hdl)) {
                        self.add_desc(o, &DescInd { hdl, uuid });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;

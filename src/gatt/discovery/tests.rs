use matches::assert_matches;
use profkit_const::{Characteristic, Descriptor, Service, Uuid};

use super::*;

static TPL: SvcTemplate = SvcTemplate {
    uuid: Service::HeartRate.uuid(),
    chars: &[
        CharTemplate::mandatory(Characteristic::HeartRateMeasurement.uuid(), CharProps::NOTIFY),
        CharTemplate::optional(Characteristic::BodySensorLocation.uuid(), CharProps::READ),
        CharTemplate::optional(Characteristic::HeartRateControlPoint.uuid(), CharProps::WRITE),
    ],
    descs: &[DescTemplate::mandatory(CCCD, 0)],
};

const CCCD: Uuid = Descriptor::ClientCharacteristicConfiguration.uuid();

fn h(v: u16) -> Handle {
    Handle::new(v).unwrap()
}

fn range(a: u16, b: u16) -> HandleRange {
    HandleRange::new(h(a), h(b))
}

fn chr(decl: u16, props: CharProps, uuid: Characteristic) -> SvcAtt {
    SvcAtt::Char {
        decl: h(decl),
        val: h(decl + 1),
        props,
        uuid: uuid.uuid(),
    }
}

fn desc(hdl: u16) -> SvcAtt {
    SvcAtt::Desc {
        hdl: h(hdl),
        uuid: CCCD,
    }
}

/// Simulated peer attribute database.
#[derive(Default)]
struct Peer {
    /// Services as `(range, uuid, primary)`.
    svcs: Vec<(HandleRange, Uuid, bool)>,
    atts: Vec<SvcAtt>,
    /// Report attribute lists with service indications.
    inline: bool,
    /// Status to complete the characteristic round with.
    char_status: Option<ErrorCode>,
    reqs: Vec<DiscReq>,
}

impl Peer {
    fn heart_rate() -> Self {
        Self {
            svcs: vec![
                (range(0x01, 0x05), Service::GenericAccess.uuid(), true),
                (range(0x10, 0x1F), Service::HeartRate.uuid(), true),
            ],
            atts: vec![
                chr(0x11, CharProps::NOTIFY, Characteristic::HeartRateMeasurement),
                desc(0x13),
                chr(0x14, CharProps::READ, Characteristic::BodySensorLocation),
            ],
            ..Self::default()
        }
    }

    fn respond(&mut self, d: &mut Discovery, req: DiscReq) -> Option<Progress> {
        self.reqs.push(req);
        let mut found = false;
        match req {
            DiscReq::Service { uuid, incl, .. } => {
                for &(r, u, primary) in &self.svcs {
                    if u == uuid && primary != incl {
                        let mut ind = SvcInd::new(r, u);
                        if self.inline {
                            ind.atts = (self.atts.iter().copied())
                                .filter(|a| match *a {
                                    SvcAtt::Char { decl, .. } => r.contains(&decl),
                                    SvcAtt::Desc { hdl, .. } => r.contains(&hdl),
                                })
                                .collect();
                        }
                        d.on_svc(&ind);
                        found = true;
                    }
                }
            }
            DiscReq::Chars { range } => {
                for a in &self.atts {
                    if let SvcAtt::Char {
                        decl,
                        val,
                        props,
                        uuid,
                    } = *a
                    {
                        if range.contains(&decl) {
                            d.on_char(&CharInd {
                                decl,
                                val,
                                props,
                                uuid,
                            });
                            found = true;
                        }
                    }
                }
                if let Some(e) = self.char_status {
                    return d.on_cmp(&Cmp {
                        op: Procedure::DiscChars,
                        status: Err(e),
                    });
                }
            }
            DiscReq::Descs { range } => {
                for a in &self.atts {
                    if let SvcAtt::Desc { hdl, uuid } = *a {
                        if range.contains(&hdl) {
                            d.on_desc(&DescInd { hdl, uuid });
                            found = true;
                        }
                    }
                }
            }
        }
        let status = if found {
            Ok(())
        } else {
            Err(ErrorCode::AttributeNotFound)
        };
        d.on_cmp(&Cmp {
            op: req.procedure(),
            status,
        })
    }

    fn run(&mut self) -> crate::Result<ServiceContent> {
        let (mut d, mut req) = Discovery::start(&TPL);
        loop {
            match self.respond(&mut d, req) {
                Some(Progress::Request(next)) => req = next,
                Some(Progress::Done(r)) => return r,
                None => panic!("completion not accepted"),
            }
        }
    }
}

#[test]
fn success() {
    let mut p = Peer::heart_rate();
    let c = p.run().unwrap();
    assert_eq!(c.range(), range(0x10, 0x1F));
    assert_eq!(c.chars()[0].val, Some(h(0x12)));
    assert_eq!(c.chars()[1].val, Some(h(0x15)));
    assert_eq!(c.chars()[2], DiscChar::default());
    assert_eq!(c.descs()[0].hdl, Some(h(0x13)));
    for hdl in [h(0x12), h(0x13), h(0x15)] {
        assert!(c.range().contains(&hdl));
    }
    assert_eq!(
        p.reqs,
        [
            DiscReq::Service {
                uuid: TPL.uuid,
                range: HandleRange::ALL,
                incl: false
            },
            DiscReq::Chars {
                range: range(0x10, 0x1F)
            },
            DiscReq::Descs {
                range: range(0x13, 0x13)
            },
        ]
    );
}

#[test]
fn fallback_once() {
    let mut p = Peer::heart_rate();
    p.svcs.remove(1);
    assert_matches!(
        p.run(),
        Err(Error::Discovery(DiscoveryError::ServiceMissing))
    );
    assert_eq!(p.reqs.len(), 2);
    assert_matches!(p.reqs[0], DiscReq::Service { incl: false, .. });
    assert_matches!(p.reqs[1], DiscReq::Service { incl: true, .. });
}

#[test]
fn fallback_found() {
    let mut p = Peer::heart_rate();
    p.svcs[1].2 = false;
    let c = p.run().unwrap();
    assert_eq!(c.range(), range(0x10, 0x1F));
    assert_eq!(p.reqs.len(), 4);
}

#[test]
fn multiple_services() {
    let mut p = Peer::heart_rate();
    p.svcs.push((range(0x20, 0x2F), TPL.uuid, true));
    assert_matches!(
        p.run(),
        Err(Error::Discovery(DiscoveryError::MultipleServicesFound))
    );
}

#[test]
fn characteristic_missing() {
    let mut p = Peer::heart_rate();
    p.atts.remove(0);
    assert_matches!(
        p.run(),
        Err(Error::Discovery(DiscoveryError::CharacteristicMissing))
    );
}

#[test]
fn property_mismatch() {
    let mut p = Peer::heart_rate();
    p.atts[2] = chr(0x14, CharProps::WRITE, Characteristic::BodySensorLocation);
    assert_matches!(
        p.run(),
        Err(Error::Discovery(DiscoveryError::PropertyMismatch))
    );
}

#[test]
fn descriptor_bounded_by_next_decl() {
    // CCCD follows the body sensor location instead of the measurement
    let mut p = Peer::heart_rate();
    p.atts.remove(1);
    p.atts.push(desc(0x16));
    assert_matches!(
        p.run(),
        Err(Error::Discovery(DiscoveryError::DescriptorMissing))
    );
}

#[test]
fn transport_error() {
    let mut p = Peer::heart_rate();
    p.char_status = Some(ErrorCode::InsufficientEncryption);
    assert_matches!(
        p.run(),
        Err(Error::Att(ErrorCode::InsufficientEncryption))
    );
}

#[test]
fn inline_attributes() {
    let mut p = Peer::heart_rate();
    p.inline = true;
    let c = p.run().unwrap();
    assert_eq!(p.reqs.len(), 1);
    assert_eq!(c.descs()[0].hdl, Some(h(0x13)));
    assert_eq!(c.chars()[1].val, Some(h(0x15)));
}

#[test]
fn unexpected_completion() {
    let (mut d, _) = Discovery::start(&TPL);
    assert!(d.on_cmp(&Cmp::ok(Procedure::Read)).is_none());
    d.on_svc(&SvcInd::new(range(1, 2), Service::Battery.uuid()));
    assert_eq!(d.matches(), 0);
}

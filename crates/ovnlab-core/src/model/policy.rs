// ── Per-type switch policy ──
//
// Each switch `type` brings its own subnet rule, auto-port addressing and
// extra constraints. Validation and topology expansion look the policy up by
// tag instead of branching on the type everywhere.

use ipnetwork::Ipv4Network;

use super::lab::{SwitchConfig, SwitchType};
use super::validate::{Addressing, Violations};

/// What a policy needs to judge one switch.
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext<'a> {
    /// Field path of the switch, e.g. `switches[2]`.
    pub path: &'a str,
    pub switch: &'a SwitchConfig,
    /// Parsed subnet, when it parsed.
    pub subnet: Option<Ipv4Network>,
    /// Resolved port total (explicit list length or effective count).
    pub port_total: Option<usize>,
}

pub trait SwitchPolicy: Send + Sync {
    /// Push every rule violation for this switch type.
    fn check(&self, ctx: &PolicyContext<'_>, out: &mut Violations);

    /// Addressing mode given to auto-generated ports.
    fn auto_addressing(&self) -> Addressing;
}

impl SwitchType {
    pub fn policy(self) -> &'static dyn SwitchPolicy {
        match self {
            Self::Normal => &NormalPolicy,
            Self::Mgmt => &MgmtPolicy,
            Self::P2p => &P2pPolicy,
        }
    }
}

fn require_max_prefix(ctx: &PolicyContext<'_>, max: u8, kind: &str, out: &mut Violations) {
    if let Some(subnet) = ctx.subnet {
        if subnet.prefix() > max {
            out.push(
                format!("{}.subnet", ctx.path),
                format!(
                    "/{} is too small for a {kind} switch (needs /{max} or larger)",
                    subnet.prefix()
                ),
            );
        }
    }
}

// ── normal ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct NormalPolicy;

impl SwitchPolicy for NormalPolicy {
    fn check(&self, ctx: &PolicyContext<'_>, out: &mut Violations) {
        require_max_prefix(ctx, 30, "normal", out);
    }

    fn auto_addressing(&self) -> Addressing {
        Addressing::Dynamic
    }
}

// ── mgmt ─────────────────────────────────────────────────────────────

/// Management segment: like `normal`, but never attached to the VPC router.
#[derive(Debug, Clone, Copy)]
pub struct MgmtPolicy;

impl SwitchPolicy for MgmtPolicy {
    fn check(&self, ctx: &PolicyContext<'_>, out: &mut Violations) {
        require_max_prefix(ctx, 30, "mgmt", out);
        if ctx.switch.routed {
            out.push(
                format!("{}.routed", ctx.path),
                "mgmt switches cannot be routed",
            );
        }
    }

    fn auto_addressing(&self) -> Addressing {
        Addressing::Dynamic
    }
}

// ── p2p ──────────────────────────────────────────────────────────────

/// Point-to-point link: a /30 or /31 with at most two ends and no DHCP.
#[derive(Debug, Clone, Copy)]
pub struct P2pPolicy;

impl SwitchPolicy for P2pPolicy {
    fn check(&self, ctx: &PolicyContext<'_>, out: &mut Violations) {
        if let Some(subnet) = ctx.subnet {
            if !matches!(subnet.prefix(), 30 | 31) {
                out.push(
                    format!("{}.subnet", ctx.path),
                    format!("p2p switches need a /30 or /31, got /{}", subnet.prefix()),
                );
            }
        }
        if ctx.switch.dhcp_enable {
            out.push(
                format!("{}.dhcp_enable", ctx.path),
                "p2p switches cannot run DHCP",
            );
        }
        if let Some(total) = ctx.port_total {
            if total > 2 {
                out.push(
                    ctx.path.to_owned(),
                    format!("p2p switches have at most 2 ports, got {total}"),
                );
            }
        }
    }

    fn auto_addressing(&self) -> Addressing {
        Addressing::Unknown
    }
}

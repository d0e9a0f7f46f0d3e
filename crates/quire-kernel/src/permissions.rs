//! Permission evaluation.
//!
//! Pure functions over an inode and a principal. Every applicable triad is
//! consulted and the results OR'ed: the owner triad when the principal owns
//! the node, the group triad when it acts within the node's tenant, and the
//! other triad always. Super-users are granted everything.

use quire_types::{Access, Class, Principal};

use crate::model::Inode;

/// Triads of `inode` that apply to `principal`.
pub fn classes(inode: &Inode, principal: &Principal) -> impl Iterator<Item = Class> {
    let owner = (principal.account == inode.owner).then_some(Class::Owner);
    let group = (principal.tenant == inode.group).then_some(Class::Group);
    owner.into_iter().chain(group).chain(Some(Class::Other))
}

/// Whether `principal` holds every bit of `access` on `inode` through at
/// least one applicable triad.
pub fn permits(inode: &Inode, principal: &Principal, access: Access) -> bool {
    principal.is_root() || classes(inode, principal).any(|class| inode.mode.allows(class, access))
}

pub fn can_read(inode: &Inode, principal: &Principal) -> bool {
    permits(inode, principal, Access::READ)
}

pub fn can_write(inode: &Inode, principal: &Principal) -> bool {
    permits(inode, principal, Access::WRITE)
}

/// Execute on a directory gates traversal into it.
pub fn can_execute(inode: &Inode, principal: &Principal) -> bool {
    permits(inode, principal, Access::EXECUTE)
}

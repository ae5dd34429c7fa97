//! C struct layouts computed at runtime.
//!
//! A layout places each member at the next offset satisfying its alignment,
//! the way a C compiler lays out a plain struct:
//!
//! ```text
//!   "flags:uint8_t; position:float[3]; id:uint64_t"
//!
//!   offset  0   1       4               16              24
//!           ┌───┬───────┬───────────────┬───────────────┐
//!           │ f │  pad  │ position[0..3]│      id       │
//!           └───┴───────┴───────────────┴───────────────┘
//!   size = 24, alignment = 8, aligned_size = 24
//! ```
//!
//! The builder also nests anonymous `union` and `struct` levels. Members of a
//! union all start at the union's base; a level is as large as its members
//! need and as aligned as its most aligned member:
//!
//! ```text
//!   tag:uint8_t; union { i:int32_t; d:double }; next:uint16_t
//!
//!   offset  0   1       8               16  18      24
//!           ┌───┬───────┬───────────────┬───┬───────┐
//!           │tag│  pad  │ i / d         │nxt│  pad  │
//!           └───┴───────┴───────────────┴───┴───────┘
//! ```
//!
//! Layouts registered in a [`LayoutRegistry`] can be used as member types of
//! later layouts. Members of an embedded struct are reached with dotted
//! paths such as `"origin.x"` or `"corners[2].y"`.

use std::{collections::HashMap, fmt, fmt::Write};

use crate::{
  align::{align_size, is_power_of_two},
  block::MemoryBlock,
  copy::CopySource,
  error::{MemoryError, Result},
  kind::{ScalarKind, ScalarValue},
};

/// The type of a struct member: a scalar or an embedded struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberType {
  Scalar(ScalarKind),
  Struct {
    name: String,
    layout: Box<StructLayout>,
  },
}

impl MemberType {
  /// An embedded struct registered as `name`.
  pub fn embedded(
    name: impl Into<String>,
    layout: StructLayout,
  ) -> Self {
    MemberType::Struct {
      name: name.into(),
      layout: Box::new(layout),
    }
  }

  /// Size of one element. An embedded struct occupies its aligned size.
  pub fn size(&self) -> usize {
    match self {
      MemberType::Scalar(kind) => kind.size(),
      MemberType::Struct { layout, .. } => layout.aligned_size(),
    }
  }

  pub fn alignment(&self) -> usize {
    match self {
      MemberType::Scalar(kind) => kind.alignment(),
      MemberType::Struct { layout, .. } => layout.alignment(),
    }
  }

  pub fn scalar(&self) -> Option<ScalarKind> {
    match self {
      MemberType::Scalar(kind) => Some(*kind),
      MemberType::Struct { .. } => None,
    }
  }

  pub fn layout(&self) -> Option<&StructLayout> {
    match self {
      MemberType::Scalar(_) => None,
      MemberType::Struct { layout, .. } => Some(&**layout),
    }
  }
}

impl From<ScalarKind> for MemberType {
  fn from(kind: ScalarKind) -> Self {
    MemberType::Scalar(kind)
  }
}

impl fmt::Display for MemberType {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      MemberType::Scalar(kind) => f.write_str(kind.name()),
      MemberType::Struct { name, .. } => f.write_str(name),
    }
  }
}

/// One member of a [`StructLayout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
  pub name: String,
  pub member_type: MemberType,
  /// Number of elements; 1 for a plain member.
  pub length: usize,
  /// Total size in bytes, `member_type.size() * length`.
  pub size: usize,
  pub alignment: usize,
  /// Offset from the start of the outermost struct.
  pub offset: usize,
}

/// An immutable list of members with their computed offsets.
///
/// Members declared inside union or nested struct levels are flattened into
/// one list in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
  members: Vec<MemberInfo>,
  index: HashMap<String, usize>,
  size: usize,
  alignment: usize,
  aligned_size: usize,
}

#[derive(Debug)]
struct PendingMember {
  name: String,
  member_type: MemberType,
  length: usize,
  alignment: Option<usize>,
}

impl PendingMember {
  fn alignment(&self) -> Result<usize> {
    let alignment = self.alignment.unwrap_or(self.member_type.alignment());
    if !is_power_of_two(alignment) {
      return Err(MemoryError::invalid_argument(format!(
        "invalid alignment for member {}: {alignment} is not a power of two",
        self.name
      )));
    }
    Ok(alignment)
  }
}

#[derive(Debug)]
enum Entry {
  Member(PendingMember),
  Level(Level),
}

impl Entry {
  fn alignment(&self) -> Result<usize> {
    match self {
      Entry::Member(member) => member.alignment(),
      Entry::Level(level) => level.alignment(),
    }
  }
}

#[derive(Debug, Default)]
struct Level {
  is_union: bool,
  alignment: Option<usize>,
  entries: Vec<Entry>,
}

impl Level {
  fn describe(&self) -> &'static str {
    if self.is_union { "union" } else { "struct" }
  }

  /// The explicit alignment if one was given, otherwise the largest alignment
  /// among the level's entries.
  fn alignment(&self) -> Result<usize> {
    if self.entries.is_empty() {
      return Err(MemoryError::invalid_argument(format!(
        "no members in {}",
        self.describe()
      )));
    }

    let mut natural = 1;
    for entry in &self.entries {
      natural = natural.max(entry.alignment()?);
    }

    match self.alignment {
      Some(alignment) if !is_power_of_two(alignment) => {
        Err(MemoryError::invalid_argument(format!(
          "invalid alignment for {}: {alignment} is not a power of two",
          self.describe()
        )))
      }
      Some(alignment) => Ok(alignment),
      None => Ok(natural),
    }
  }
}

/// Collects members in declaration order and computes a [`StructLayout`].
///
/// ```rust
/// use snowmem::{ScalarKind, StructLayout};
///
/// let layout = StructLayout::builder()
///   .member("tag", ScalarKind::Uint8)
///   .union(|u| u.member("i", ScalarKind::Int32).member("d", ScalarKind::Double))
///   .build()
///   .unwrap();
///
/// assert_eq!(layout.offset_of("i"), Some(8));
/// assert_eq!(layout.offset_of("d"), Some(8));
/// assert_eq!(layout.size(), 16);
/// ```
#[derive(Debug, Default)]
pub struct LayoutBuilder {
  level: Level,
}

impl LayoutBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn member(
    self,
    name: impl Into<String>,
    member_type: impl Into<MemberType>,
  ) -> Self {
    self.push(name.into(), member_type.into(), 1, None)
  }

  pub fn array(
    self,
    name: impl Into<String>,
    member_type: impl Into<MemberType>,
    length: usize,
  ) -> Self {
    self.push(name.into(), member_type.into(), length, None)
  }

  /// Adds a member with an explicit alignment instead of the type's natural one.
  pub fn member_aligned(
    self,
    name: impl Into<String>,
    member_type: impl Into<MemberType>,
    length: usize,
    alignment: usize,
  ) -> Self {
    self.push(name.into(), member_type.into(), length, Some(alignment))
  }

  /// Declares the members added by `members` as one union.
  pub fn union(
    self,
    members: impl FnOnce(LayoutBuilder) -> LayoutBuilder,
  ) -> Self {
    self.level(true, None, members)
  }

  /// Like [`union`](Self::union), with the union's base aligned to
  /// `alignment` instead of its most aligned member.
  pub fn union_aligned(
    self,
    alignment: usize,
    members: impl FnOnce(LayoutBuilder) -> LayoutBuilder,
  ) -> Self {
    self.level(true, Some(alignment), members)
  }

  /// Declares the members added by `members` as an anonymous nested struct.
  pub fn structure(
    self,
    members: impl FnOnce(LayoutBuilder) -> LayoutBuilder,
  ) -> Self {
    self.level(false, None, members)
  }

  pub fn structure_aligned(
    self,
    alignment: usize,
    members: impl FnOnce(LayoutBuilder) -> LayoutBuilder,
  ) -> Self {
    self.level(false, Some(alignment), members)
  }

  fn level(
    mut self,
    is_union: bool,
    alignment: Option<usize>,
    members: impl FnOnce(LayoutBuilder) -> LayoutBuilder,
  ) -> Self {
    let inner = members(LayoutBuilder {
      level: Level {
        is_union,
        alignment,
        entries: Vec::new(),
      },
    });
    self.level.entries.push(Entry::Level(inner.level));
    self
  }

  fn push(
    mut self,
    name: String,
    member_type: MemberType,
    length: usize,
    alignment: Option<usize>,
  ) -> Self {
    self.level.entries.push(Entry::Member(PendingMember {
      name,
      member_type,
      length,
      alignment,
    }));
    self
  }

  pub fn build(self) -> Result<StructLayout> {
    if self.level.entries.is_empty() {
      return Err(MemoryError::invalid_argument("no members in struct layout"));
    }

    let alignment = self.level.alignment()?;
    let mut placement = Placement::default();
    let size = placement.place(self.level, 0)?;
    let aligned_size = align_size(size, alignment)?;

    Ok(StructLayout {
      members: placement.members,
      index: placement.index,
      size,
      alignment,
      aligned_size,
    })
  }
}

#[derive(Default)]
struct Placement {
  members: Vec<MemberInfo>,
  index: HashMap<String, usize>,
}

impl Placement {
  /// Places `level` at the first suitably aligned offset from `start` and
  /// returns its size.
  fn place(
    &mut self,
    level: Level,
    start: usize,
  ) -> Result<usize> {
    let base = align_size(start, level.alignment()?)?;
    let Level {
      is_union, entries, ..
    } = level;

    let mut offset = base;
    let mut size = 0;

    for entry in entries {
      let entry_offset = align_size(offset, entry.alignment()?)?;
      let entry_size = match entry {
        Entry::Member(member) => self.push(member, entry_offset)?,
        Entry::Level(inner) => self.place(inner, entry_offset)?,
      };
      let end = entry_offset
        .checked_add(entry_size)
        .ok_or_else(|| MemoryError::invalid_argument("struct layout overflows"))?;

      if is_union {
        size = size.max(end - base);
      } else {
        size = end - base;
        offset = end;
      }
    }

    Ok(size)
  }

  fn push(
    &mut self,
    member: PendingMember,
    offset: usize,
  ) -> Result<usize> {
    let alignment = member.alignment()?;
    let PendingMember {
      name,
      member_type,
      length,
      ..
    } = member;

    if self.index.contains_key(&name) {
      return Err(MemoryError::invalid_argument(format!(
        "{name} redefined in struct"
      )));
    }
    if length < 1 {
      return Err(MemoryError::invalid_argument(format!(
        "invalid length for member {name}: must be >= 1"
      )));
    }

    let size = member_type.size().checked_mul(length).ok_or_else(|| {
      MemoryError::invalid_argument(format!("member {name} is too large"))
    })?;

    self.index.insert(name.clone(), self.members.len());
    self.members.push(MemberInfo {
      name,
      member_type,
      length,
      size,
      alignment,
      offset,
    });

    Ok(size)
  }
}

impl StructLayout {
  pub fn builder() -> LayoutBuilder {
    LayoutBuilder::new()
  }

  /// Parses a layout encoding such as `"x:float; y:float; tag:char[8]:4"`.
  ///
  /// Each entry is `name:type`, optionally followed by `[count]` and
  /// `:alignment`. Entries are separated by `;` or newlines. `type` is a
  /// canonical scalar name, a short alias, or `*` for a pointer. Use
  /// [`LayoutRegistry::parse`] for encodings naming struct types.
  pub fn parse(encoding: &str) -> Result<StructLayout> {
    LayoutRegistry::new().parse(encoding)
  }

  pub fn members(&self) -> &[MemberInfo] {
    &self.members
  }

  pub fn member(
    &self,
    name: &str,
  ) -> Option<&MemberInfo> {
    self.index.get(name).map(|position| &self.members[*position])
  }

  /// Offset of a member, or of a dotted path into embedded structs.
  pub fn offset_of(
    &self,
    path: &str,
  ) -> Option<usize> {
    self.resolve(path, 0).ok().map(|(_, offset)| offset)
  }

  /// Offset of the last member's end.
  pub fn size(&self) -> usize {
    self.size
  }

  pub fn alignment(&self) -> usize {
    self.alignment
  }

  /// `size` rounded up to `alignment`: the stride between array elements.
  pub fn aligned_size(&self) -> usize {
    self.aligned_size
  }

  /// Canonical encoding, `name:type[length]:alignment;` per member.
  ///
  /// Union and nested struct levels are flattened, so only layouts without
  /// them parse back to an equal layout.
  pub fn encoding(&self) -> String {
    let mut encoding = String::new();
    for member in &self.members {
      let _ = write!(
        encoding,
        "{}:{}[{}]:{};",
        member.name, member.member_type, member.length, member.alignment
      );
    }
    encoding
  }

  fn lookup(
    &self,
    name: &str,
  ) -> Result<&MemberInfo> {
    self
      .member(name)
      .ok_or_else(|| MemoryError::invalid_argument(format!("no member named {name}")))
  }

  /// Finds the member at the end of `path` and the offset of its element
  /// `index`, relative to the start of this struct.
  fn resolve(
    &self,
    path: &str,
    index: usize,
  ) -> Result<(&MemberInfo, usize)> {
    let Some((head, rest)) = path.split_once('.') else {
      let member = self.lookup(path)?;
      if index >= member.length {
        return Err(MemoryError::out_of_bounds(index, 1, member.length));
      }
      return Ok((member, member.offset + index * member.member_type.size()));
    };

    let (name, element) = parse_segment(head)?;
    let member = self.lookup(name)?;
    if element >= member.length {
      return Err(MemoryError::out_of_bounds(element, 1, member.length));
    }
    let layout = member
      .member_type
      .layout()
      .ok_or_else(|| MemoryError::invalid_argument(format!("member {name} is not a struct")))?;

    let (inner, offset) = layout.resolve(rest, index)?;
    Ok((inner, member.offset + element * member.member_type.size() + offset))
  }

  fn locate(
    &self,
    element: usize,
    path: &str,
    index: usize,
  ) -> Result<(&MemberInfo, usize)> {
    let (member, offset) = self.resolve(path, index)?;

    let offset = element
      .checked_mul(self.aligned_size)
      .and_then(|base| base.checked_add(offset))
      .ok_or(MemoryError::out_of_bounds(element, self.aligned_size, usize::MAX))?;

    Ok((member, offset))
  }
}

/// Splits `name[element]` into its parts; a bare name is element 0.
fn parse_segment(segment: &str) -> Result<(&str, usize)> {
  let invalid = || MemoryError::invalid_argument(format!("invalid member path '{segment}'"));

  match segment.split_once('[') {
    Some((name, element)) => {
      let element = element.strip_suffix(']').ok_or_else(invalid)?;
      Ok((name, element.parse::<usize>().map_err(|_| invalid())?))
    }
    None => Ok((segment, 0)),
  }
}

fn is_identifier(name: &str) -> bool {
  let starts_well = name
    .chars()
    .next()
    .is_some_and(|first| first == '_' || first.is_ascii_alphabetic());
  starts_well && name.chars().all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Named struct layouts usable as member types in encodings.
///
/// ```rust
/// use snowmem::LayoutRegistry;
///
/// let mut types = LayoutRegistry::new();
/// let vec3 = types.parse("x:float; y:float; z:float").unwrap();
/// types.register("vec3", vec3).unwrap();
///
/// let ray = types.parse("origin:vec3; direction:vec3").unwrap();
/// assert_eq!(ray.offset_of("direction.y"), Some(16));
/// ```
#[derive(Debug, Clone, Default)]
pub struct LayoutRegistry {
  types: HashMap<String, StructLayout>,
}

impl LayoutRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `layout` under `name`. Scalar type names and aliases cannot
  /// be shadowed, and a name can only be registered once.
  pub fn register(
    &mut self,
    name: impl Into<String>,
    layout: StructLayout,
  ) -> Result<&mut Self> {
    let name = name.into();

    if !is_identifier(&name) || ScalarKind::from_name(&name).is_some() {
      return Err(MemoryError::invalid_argument(format!(
        "'{name}' cannot be used as a struct type name"
      )));
    }
    if self.types.contains_key(&name) {
      return Err(MemoryError::invalid_argument(format!(
        "struct type {name} is already registered"
      )));
    }

    self.types.insert(name, layout);
    Ok(self)
  }

  pub fn get(
    &self,
    name: &str,
  ) -> Option<&StructLayout> {
    self.types.get(name)
  }

  /// Parses an encoding whose member types may also be registered struct
  /// names. See [`StructLayout::parse`] for the format.
  pub fn parse(
    &self,
    encoding: &str,
  ) -> Result<StructLayout> {
    let mut builder = LayoutBuilder::new();

    for entry in encoding.split([';', '\n']) {
      let entry = entry.trim();
      if entry.is_empty() {
        continue;
      }
      let (name, member_type, length, alignment) = self.parse_entry(entry)?;
      builder = builder.push(name, member_type, length, alignment);
    }

    builder.build()
  }

  fn resolve(
    &self,
    type_name: &str,
  ) -> Result<MemberType> {
    if let Some(kind) = ScalarKind::from_name(type_name) {
      return Ok(MemberType::Scalar(kind));
    }
    self
      .types
      .get(type_name)
      .map(|layout| MemberType::embedded(type_name, layout.clone()))
      .ok_or_else(|| {
        MemoryError::invalid_argument(format!("unknown member type '{type_name}'"))
      })
  }

  fn parse_entry(
    &self,
    entry: &str,
  ) -> Result<(String, MemberType, usize, Option<usize>)> {
    let invalid = || MemoryError::invalid_argument(format!("invalid member encoding '{entry}'"));

    let (name, rest) = entry.split_once(':').ok_or_else(invalid)?;
    let name = name.trim();
    if !is_identifier(name) {
      return Err(invalid());
    }

    let (type_part, alignment) = match rest.split_once(':') {
      Some((type_part, alignment)) => {
        let alignment = alignment.trim().parse::<usize>().map_err(|_| invalid())?;
        (type_part.trim(), Some(alignment))
      }
      None => (rest.trim(), None),
    };

    let (type_name, length) = match type_part.split_once('[') {
      Some((type_name, count)) => {
        let count = count.trim().strip_suffix(']').ok_or_else(invalid)?;
        let length = count.trim().parse::<usize>().map_err(|_| invalid())?;
        (type_name.trim(), length)
      }
      None => (type_part, 1),
    };

    let member_type = self.resolve(type_name)?;

    Ok((name.to_string(), member_type, length, alignment))
  }
}

impl MemoryBlock {
  /// Allocates a zeroed block sized and aligned for one `layout`.
  pub fn allocate_struct(layout: &StructLayout) -> Result<Self> {
    Self::allocate_aligned(layout.size(), layout.alignment())
  }

  /// Allocates a zeroed block holding `count` consecutive `layout` elements.
  pub fn allocate_array(
    layout: &StructLayout,
    count: usize,
  ) -> Result<Self> {
    if count < 1 {
      return Err(MemoryError::invalid_argument(
        "array length must be 1 or greater",
      ));
    }
    let size = layout
      .aligned_size()
      .checked_mul(count)
      .ok_or_else(|| MemoryError::invalid_argument("array size overflows"))?;
    Self::allocate_aligned(size, layout.alignment())
  }

  /// Reads element `index` of scalar member `path` in struct number
  /// `element`. `path` may reach into embedded structs, e.g. `"origin.x"`.
  pub fn get_member(
    &self,
    layout: &StructLayout,
    element: usize,
    path: &str,
    index: usize,
  ) -> Result<ScalarValue> {
    let (member, offset) = layout.locate(element, path, index)?;
    self.get_value(scalar_kind(member)?, offset)
  }

  /// Writes element `index` of scalar member `path` in struct number
  /// `element` and returns the stored value.
  pub fn set_member(
    &mut self,
    layout: &StructLayout,
    element: usize,
    path: &str,
    index: usize,
    value: ScalarValue,
  ) -> Result<ScalarValue> {
    let (member, offset) = layout.locate(element, path, index)?;
    self.set_value(scalar_kind(member)?, offset, value)
  }

  /// Copies element `index` of embedded struct member `path` into a new
  /// owned block allocated for the member's layout.
  pub fn get_struct_member(
    &self,
    layout: &StructLayout,
    element: usize,
    path: &str,
    index: usize,
  ) -> Result<MemoryBlock> {
    self.check_not_null()?;
    let (member, offset) = layout.locate(element, path, index)?;
    let nested = struct_layout(member)?;
    self.check_bounds(offset, nested.size())?;

    let mut copy = MemoryBlock::allocate_struct(nested)?;
    copy.copy_from(CopySource::Block(self), 0, offset, Some(nested.size()))?;
    Ok(copy)
  }

  /// Copies the first `size` bytes of `value` over element `index` of
  /// embedded struct member `path`, where `size` is the member layout's size.
  pub fn set_struct_member(
    &mut self,
    layout: &StructLayout,
    element: usize,
    path: &str,
    index: usize,
    value: &MemoryBlock,
  ) -> Result<&mut Self> {
    let (member, offset) = layout.locate(element, path, index)?;
    let nested = struct_layout(member)?;
    self.copy_from(CopySource::Block(value), offset, 0, Some(nested.size()))
  }
}

fn scalar_kind(member: &MemberInfo) -> Result<ScalarKind> {
  member.member_type.scalar().ok_or_else(|| {
    MemoryError::invalid_argument(format!("member {} is a struct, not a scalar", member.name))
  })
}

fn struct_layout(member: &MemberInfo) -> Result<&StructLayout> {
  member.member_type.layout().ok_or_else(|| {
    MemoryError::invalid_argument(format!("member {} is not a struct", member.name))
  })
}

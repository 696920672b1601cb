//! Shared fixtures for unit tests.

use crate::models::{
    stable_id, MessageModel, ParticipantModel, ReferenceAnchor, ReferenceModel,
    SequenceDiagramModel, ACTOR_TYPE, REF_TYPE,
};

/// Teller → AccountService deposit flow, exported with diagram shapes.
pub const DEPOSIT_SEQUENCE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Project Author="qa" Xml_structure="simple" UmlVersion="2.x">
  <Models>
    <Frame Id="F1" Name="DepositSequence">
      <ModelChildren>
        <Interaction Id="I1" Name="DepositSequence">
          <ModelChildren>
            <InteractionActor Id="A1" Name="Customer"/>
            <InteractionLifeLine Id="L1" Name="teller">
              <BaseClassifier><Class Idref="C1" Name="Teller"/></BaseClassifier>
            </InteractionLifeLine>
            <InteractionLifeLine Id="L2" Name="accounts" BaseClassifier="C2"/>
          </ModelChildren>
        </Interaction>
      </ModelChildren>
    </Frame>
    <Class Id="C1" Name="Teller"/>
    <Class Id="C2" Name="AccountService">
      <ModelChildren>
        <Operation Id="OP1" Name="processDeposit"/>
      </ModelChildren>
    </Class>
    <ModelRelationshipContainer Id="RC1" Name="relationships">
      <ModelChildren>
        <ModelRelationshipContainer Id="RC2" Name="Message">
          <ModelChildren>
            <Message Id="M1" Name="deposit cash" Type="message" EndRelationshipFromMetaModelElement="A1" EndRelationshipToMetaModelElement="L1"/>
            <Message Id="M2" Name="processDeposit(amount)" EndRelationshipFromMetaModelElement="L1" EndRelationshipToMetaModelElement="L2">
              <ActionType><ActionTypeCall Operation="OP1"/></ActionType>
            </Message>
            <Message Id="M3" Name="true" Type="message" EndRelationshipFromMetaModelElement="L2" EndRelationshipToMetaModelElement="L1"/>
            <Message Id="M4" Name="receipt" Type="message" EndRelationshipFromMetaModelElement="L1" EndRelationshipToMetaModelElement="A1"/>
          </ModelChildren>
        </ModelRelationshipContainer>
      </ModelChildren>
    </ModelRelationshipContainer>
  </Models>
  <Diagrams>
    <InteractionDiagram Id="D1" Name="DepositSequence">
      <Shapes>
        <Frame Id="S0" Model="F1" Name="DepositSequence"/>
        <InteractionActor Id="S1" Model="A1" Name="Customer"/>
        <InteractionLifeLine Id="S2" Model="L1" Name="teller"/>
        <InteractionLifeLine Id="S3" Model="L2" Name="accounts"/>
      </Shapes>
    </InteractionDiagram>
  </Diagrams>
</Project>"#;

/// Class catalog for the deposit flow.
pub const BANK_CLASSES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Project Xml_structure="simple" UmlVersion="2.x">
  <Models>
    <DataType Id="T_BOOL" Name="boolean"/>
    <DataType Id="T_DOUBLE" Name="double"/>
    <DataType Id="T_LONG" Name="long"/>
    <Package Id="P1" Name="bank">
      <ModelChildren>
        <Class Id="C2" Name="AccountService">
          <ModelChildren>
            <Operation Id="OP1" Name="processDeposit" Visibility="Public">
              <ReturnType><DataType Idref="T_BOOL" Name="boolean"/></ReturnType>
              <ModelChildren>
                <Parameter Id="PA1" Name="amount" Type="T_DOUBLE"/>
              </ModelChildren>
            </Operation>
          </ModelChildren>
        </Class>
        <Class Id="C1" Name="Teller">
          <ModelChildren>
            <Operation Id="OP2" Name="handleDeposit" Visibility="public" ReturnType="void">
              <ModelChildren>
                <Parameter Id="PA2" Name="accountId"><Type><DataType Idref="T_LONG"/></Type></Parameter>
                <Parameter Id="PA3" Name="amount" Type="double"/>
              </ModelChildren>
            </Operation>
          </ModelChildren>
        </Class>
      </ModelChildren>
    </Package>
  </Models>
</Project>"#;

/// Two-lifeline flow where `caller` sends `call` to `callee`, plus a `ref`
/// box covering the diagram named `covers`.
pub fn covering_flow_xml(caller: &str, callee: &str, call: &str, covers: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Project Xml_structure="simple" UmlVersion="2.x">
  <Models>
    <Frame Id="F1" Name="flow">
      <ModelChildren>
        <Interaction Id="I1">
          <ModelChildren>
            <InteractionLifeLine Id="L1" Name="caller" BaseClassifier="C1"/>
            <InteractionLifeLine Id="L2" Name="callee" BaseClassifier="C2"/>
            <InteractionOccurrence Id="O1" Name="ref {covers}">
              <CoveredInteraction><Frame Idref="EXTERNAL" Name="{covers}"/></CoveredInteraction>
            </InteractionOccurrence>
          </ModelChildren>
        </Interaction>
      </ModelChildren>
    </Frame>
    <Class Id="C1" Name="{caller}"/>
    <Class Id="C2" Name="{callee}"/>
    <ModelRelationshipContainer Id="R1">
      <ModelChildren>
        <Message Id="M1" Name="{call}" EndRelationshipFromMetaModelElement="L1" EndRelationshipToMetaModelElement="L2"/>
      </ModelChildren>
    </ModelRelationshipContainer>
  </Models>
</Project>"#
    )
}

/// Matrix row for the deposit flow.
pub const DEPOSIT_MATRIX_CSV: &str = "Requirement ID,Function Name,Sequence Diagram\nFR1,Deposit Funds,DepositSequence\n";

pub fn diagram_named(name: &str) -> SequenceDiagramModel {
    SequenceDiagramModel {
        id: stable_id("sd", name),
        name: name.to_string(),
        objects: Vec::new(),
        messages: Vec::new(),
        references: Vec::new(),
    }
}

/// Small builder for hand-assembled diagrams.
pub struct DiagramBuilder {
    diagram: SequenceDiagramModel,
}

impl DiagramBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            diagram: diagram_named(name),
        }
    }

    fn participant(mut self, id: &str, type_name: &str) -> Self {
        self.diagram.objects.push(ParticipantModel {
            id: id.to_string(),
            name: id.to_string(),
            type_name: type_name.to_string(),
        });
        self
    }

    pub fn lifeline(self, id: &str, class_name: &str) -> Self {
        self.participant(id, class_name)
    }

    pub fn actor(self, id: &str) -> Self {
        self.participant(id, ACTOR_TYPE)
    }

    pub fn occurrence(mut self, id: &str, label: &str) -> Self {
        self.diagram.objects.push(ParticipantModel {
            id: id.to_string(),
            name: label.to_string(),
            type_name: REF_TYPE.to_string(),
        });
        self
    }

    pub fn message(mut self, from: &str, to: &str, name: &str) -> Self {
        let id = format!("msg_{}", self.diagram.messages.len());
        self.diagram.messages.push(MessageModel {
            id,
            from: from.to_string(),
            to: to.to_string(),
            name: name.to_string(),
            message_type: "synchCall".to_string(),
        });
        self
    }

    pub fn reference(mut self, label: &str, target: Option<&str>, occurrence: Option<&str>) -> Self {
        let id = format!("ref_{}", self.diagram.references.len());
        self.diagram.references.push(ReferenceModel {
            id,
            name: label.to_string(),
            diagram_name: target.map(str::to_string),
            anchor: occurrence.map(|p| ReferenceAnchor::Occurrence {
                participant_id: p.to_string(),
            }),
        });
        self
    }

    pub fn build(self) -> SequenceDiagramModel {
        self.diagram
    }
}
